// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR integration for text extraction from images
//!
//! This module provides CPU-based OCR using PaddleOCR ONNX models.
//!
//! Components:
//! - `engine` - The `OcrEngine` trait the HTTP layer depends on
//! - `detection` - Text region detection (DB)
//! - `geometry` - Minimum-area rectangles for rotated boxes
//! - `classification` - Optional 0°/180° text-line angle classifier
//! - `recognition` - Text recognition from detected regions
//! - `preprocessing` - Image preprocessing for models
//! - `model` - Combined OCR pipeline

pub mod classification;
pub mod detection;
pub mod engine;
pub mod geometry;
pub mod model;
pub mod preprocessing;
pub mod recognition;

pub use classification::{AngleClassifier, TextOrientation};
pub use detection::{DetectionParams, OcrDetectionModel, TextBox};
pub use engine::{OcrEngine, OcrError, Quad, RecognizedRegion};
pub use model::{ModelFiles, PaddleOcrConfig, PaddleOcrModel, SUPPORTED_LANGUAGES};
pub use recognition::{OcrRecognitionModel, RecognizedText};
