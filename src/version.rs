// Version information for the PaddleOCR API service

/// Human-readable service name reported by `GET /`
pub const SERVICE_NAME: &str = "PaddleOCR API";

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} v{}", SERVICE_NAME, VERSION)
}
