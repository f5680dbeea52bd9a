// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ocr::UploadError;
use crate::vision::{ModelUnavailable, OcrError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error_type: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    MissingFile,
    EmptyFile,
    UnsupportedFormat(String),
    PayloadTooLarge { max_bytes: usize },
    InvalidMultipart(String),
    ServiceUnavailable(String),
    OcrFailed(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let error_type = match self {
            ApiError::MissingFile => "missing_file",
            ApiError::EmptyFile => "empty_file",
            ApiError::UnsupportedFormat(_) => "unsupported_format",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::InvalidMultipart(_) => "invalid_multipart",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::OcrFailed(_) => "ocr_failed",
            ApiError::InternalError(_) => "internal_error",
        };

        ErrorResponse {
            success: false,
            error_type: error_type.to_string(),
            detail: self.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingFile | ApiError::EmptyFile | ApiError::InvalidMultipart(_) => 400,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::UnsupportedFormat(_) => 415,
            ApiError::OcrFailed(_) | ApiError::InternalError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingFile => write!(f, "No file uploaded: expected multipart field 'file'"),
            ApiError::EmptyFile => write!(f, "Uploaded file is empty"),
            ApiError::UnsupportedFormat(msg) => write!(f, "Unsupported file type: {}", msg),
            ApiError::PayloadTooLarge { max_bytes } => {
                write!(f, "File exceeds maximum size of {} bytes", max_bytes)
            }
            ApiError::InvalidMultipart(msg) => write!(f, "Invalid multipart request: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::OcrFailed(msg) => write!(f, "OCR processing failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::MissingFile => ApiError::MissingFile,
            UploadError::EmptyFile => ApiError::EmptyFile,
            UploadError::UnsupportedFormat(msg) => ApiError::UnsupportedFormat(msg),
            UploadError::TooLarge { max_bytes } => ApiError::PayloadTooLarge { max_bytes },
            UploadError::Multipart(msg) => ApiError::InvalidMultipart(msg),
        }
    }
}

impl From<ModelUnavailable> for ApiError {
    fn from(err: ModelUnavailable) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        ApiError::OcrFailed(err.to_string())
    }
}
