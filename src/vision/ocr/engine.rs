// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The narrow OCR capability the HTTP layer depends on

use thiserror::Error;

use crate::vision::ImageError;

/// Four 2D points delimiting a text region, in the order the engine emits them
pub type Quad = [[f32; 2]; 4];

/// One detected and recognized text span
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedRegion {
    /// Recognized text content
    pub text: String,
    /// Engine-reported confidence
    pub confidence: f32,
    /// Bounding quadrilateral in original image pixels
    pub points: Quad,
}

/// Errors an OCR engine can report for a single image
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("OCR inference failed: {0}")]
    Inference(String),
}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::Inference(format!("{:#}", err))
    }
}

/// Text detection + recognition over encoded image bytes
///
/// Implementations are loaded once and shared read-only across requests,
/// so `detect` takes `&self` and must be safe to call concurrently.
pub trait OcrEngine: Send + Sync {
    /// Short engine identifier used in logs
    fn name(&self) -> &str;

    /// Detect and recognize all text regions in an encoded image
    ///
    /// Returns an empty vector when the image contains no text.
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RecognizedRegion>, OcrError>;
}
