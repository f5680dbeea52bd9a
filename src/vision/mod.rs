// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based OCR
//!
//! This module provides:
//! - Image decoding and format detection
//! - OCR (Optical Character Recognition) via PaddleOCR
//! - The shared, set-once model handle used by the HTTP layer

pub mod image_utils;
pub mod model_manager;
pub mod ocr;

pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo, ImageKind};
pub use model_manager::{ModelStatus, ModelUnavailable, OcrModelManager};
pub use ocr::{OcrEngine, OcrError, RecognizedRegion};
