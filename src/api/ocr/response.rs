// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::{Deserialize, Serialize};

use crate::vision::ocr::{Quad, RecognizedRegion};

/// A detected text span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Four corner points, in the order the engine reported them
    #[serde(rename = "box")]
    pub bounding_box: Quad,
}

impl DetectionResult {
    pub fn new(text: impl Into<String>, confidence: f32, bounding_box: Quad) -> Self {
        Self {
            text: text.into(),
            confidence: normalize_confidence(confidence),
            bounding_box,
        }
    }
}

impl From<RecognizedRegion> for DetectionResult {
    fn from(region: RecognizedRegion) -> Self {
        Self::new(region.text, region.confidence, region.points)
    }
}

/// Response from OCR processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    /// Empty when the image contains no text
    pub results: Vec<DetectionResult>,
    /// Wall-clock time of the engine call in milliseconds
    pub processing_time_ms: f64,
}

impl OcrResponse {
    pub fn new(results: Vec<DetectionResult>, processing_time_ms: f64) -> Self {
        Self {
            success: true,
            results,
            processing_time_ms: processing_time_ms.max(0.0),
        }
    }
}

fn normalize_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
