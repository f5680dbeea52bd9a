// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Resolved once at startup from CLI flags, environment variables and an
//! optional `.env` file (loaded by `main` before parsing).

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::api::ocr::UploadPolicy;
use crate::vision::ocr::{PaddleOcrConfig, SUPPORTED_LANGUAGES};
use crate::vision::ImageKind;

/// Default upload cap: 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// PaddleOCR HTTP API
#[derive(Parser, Debug, Clone)]
#[command(name = "paddleocr-api")]
#[command(version)]
#[command(about = "HTTP API for PaddleOCR text extraction", long_about = None)]
pub struct ServiceConfig {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Comma-separated list of accepted image formats
    #[arg(
        long,
        env = "ALLOWED_IMAGE_TYPES",
        value_enum,
        value_delimiter = ',',
        default_values_t = ImageKind::ALL.to_vec()
    )]
    pub allowed_types: Vec<ImageKind>,

    /// Directory containing the PaddleOCR ONNX models
    #[arg(long, env = "OCR_MODEL_DIR", default_value = "./models/paddleocr-onnx")]
    pub model_dir: PathBuf,

    /// Recognition language (en, ch, japan, korean)
    #[arg(long, env = "OCR_LANG", default_value = "en")]
    pub lang: String,

    /// Run the text-line angle classifier when its model is present
    #[arg(
        long,
        env = "OCR_USE_ANGLE_CLS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub use_angle_cls: bool,

    /// Minimum recognition confidence for a region to be returned
    #[arg(long, env = "OCR_DROP_SCORE", default_value_t = 0.5)]
    pub drop_score: f32,

    /// ONNX Runtime intra-op threads per model session
    #[arg(long, env = "OCR_CPU_THREADS", default_value_t = 1)]
    pub cpu_threads: usize,
}

impl ServiceConfig {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            bail!("max upload size must be greater than zero");
        }
        if self.allowed_types.is_empty() {
            bail!("at least one image type must be allowed");
        }
        if !SUPPORTED_LANGUAGES.contains(&self.lang.as_str()) {
            bail!(
                "unsupported OCR language '{}', expected one of {:?}",
                self.lang,
                SUPPORTED_LANGUAGES
            );
        }
        if !(0.0..=1.0).contains(&self.drop_score) {
            bail!("drop score must be within [0, 1], got {}", self.drop_score);
        }
        if self.cpu_threads == 0 {
            bail!("cpu threads must be greater than zero");
        }
        Ok(())
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.max_upload_bytes, self.allowed_types.iter().copied())
    }

    pub fn engine_config(&self) -> PaddleOcrConfig {
        PaddleOcrConfig {
            model_dir: self.model_dir.clone(),
            lang: self.lang.clone(),
            use_angle_cls: self.use_angle_cls,
            drop_score: self.drop_score,
            intra_threads: self.cpu_threads,
            ..PaddleOcrConfig::default()
        }
    }
}
