// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload extraction and validation for POST /ocr

use axum::http::StatusCode;
use axum_extra::extract::multipart::MultipartError;
use axum_extra::extract::Multipart;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::vision::{detect_format, ImageKind};

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// Room left in the request body limit for multipart boundaries and headers
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Generic content type sent by clients that don't know the real one
const OCTET_STREAM: &str = "application/octet-stream";

/// Why an upload was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file uploaded: expected multipart field 'file'")]
    MissingFile,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("File exceeds maximum size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("Malformed multipart body: {0}")]
    Multipart(String),
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    /// Content type declared in the multipart part headers
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Size cap and format allow-list applied to every upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    max_bytes: usize,
    allowed: Vec<ImageKind>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES, ImageKind::ALL)
    }
}

impl UploadPolicy {
    pub fn new(max_bytes: usize, allowed: impl IntoIterator<Item = ImageKind>) -> Self {
        let mut kinds: Vec<ImageKind> = Vec::new();
        for kind in allowed {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self {
            max_bytes,
            allowed: kinds,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn allowed(&self) -> &[ImageKind] {
        &self.allowed
    }

    pub fn allows(&self, kind: ImageKind) -> bool {
        self.allowed.contains(&kind)
    }

    /// Request body limit for the whole multipart request
    pub fn body_limit(&self) -> usize {
        self.max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)
    }

    /// Check the declared content type and file name before reading the body
    pub fn check_declared(
        &self,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<(), UploadError> {
        if let Some(content_type) = content_type.filter(|ct| !is_generic(ct)) {
            match ImageKind::from_mime(content_type) {
                Some(kind) if self.allows(kind) => {}
                _ => {
                    return Err(UploadError::UnsupportedFormat(format!(
                        "content type '{}' is not allowed (allowed: {})",
                        content_type,
                        self.allowed_list()
                    )))
                }
            }
        }

        if let Some(file_name) = file_name.filter(|name| name.contains('.')) {
            match ImageKind::from_file_name(file_name) {
                Some(kind) if self.allows(kind) => {}
                _ => {
                    return Err(UploadError::UnsupportedFormat(format!(
                        "file extension of '{}' is not allowed (allowed: {})",
                        file_name,
                        self.allowed_list()
                    )))
                }
            }
        }

        Ok(())
    }

    /// Validate a fully received upload, returning its sniffed format
    pub fn validate(&self, upload: &UploadedImage) -> Result<ImageKind, UploadError> {
        self.check_declared(upload.content_type.as_deref(), upload.file_name.as_deref())?;

        if upload.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        if upload.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        match detect_format(&upload.bytes) {
            Ok(kind) if self.allows(kind) => Ok(kind),
            Ok(kind) => Err(UploadError::UnsupportedFormat(format!(
                "{} images are not allowed (allowed: {})",
                kind,
                self.allowed_list()
            ))),
            Err(_) => Err(UploadError::UnsupportedFormat(
                "file content is not a recognized image".to_string(),
            )),
        }
    }

    fn allowed_list(&self) -> String {
        self.allowed
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn is_generic(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(OCTET_STREAM))
        .unwrap_or(false)
}

/// Pull the `file` field out of a multipart body
///
/// The field is read chunk by chunk and abandoned as soon as it grows past
/// the policy cap. Other fields are skipped.
pub async fn read_upload(
    multipart: &mut Multipart,
    policy: &UploadPolicy,
) -> Result<UploadedImage, UploadError> {
    let to_upload_error = |err: MultipartError| multipart_error(err, policy);

    while let Some(mut field) = multipart.next_field().await.map_err(to_upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        policy.check_declared(content_type.as_deref(), file_name.as_deref())?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(to_upload_error)? {
            if buffer.len() + chunk.len() > policy.max_bytes() {
                return Err(UploadError::TooLarge {
                    max_bytes: policy.max_bytes(),
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        return Ok(UploadedImage {
            bytes: buffer.freeze(),
            content_type,
            file_name,
        });
    }

    Err(UploadError::MissingFile)
}

/// The body limit surfaces as a multipart error; report it as an oversized file
fn multipart_error(err: MultipartError, policy: &UploadPolicy) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            max_bytes: policy.max_bytes(),
        }
    } else {
        UploadError::Multipart(err.to_string())
    }
}
