// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text-line angle classifier
//!
//! Decides whether a cropped text line is upside down so it can be rotated
//! before recognition.

use anyhow::{anyhow, Context, Result};
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::{CLS_INPUT_HEIGHT, CLS_INPUT_WIDTH};

/// Orientation of a text line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrientation {
    Upright,
    Rotated180,
}

/// PaddleOCR angle classifier (labels: 0°, 180°)
#[derive(Clone)]
pub struct AngleClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
    /// Minimum 180° score required before a crop is flipped
    threshold: f32,
}

impl std::fmt::Debug for AngleClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AngleClassifier")
            .field("input_name", &self.input_name)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl AngleClassifier {
    /// Load the classifier from `cls_model.onnx`
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR angle classifier not found: {}", model_path.display());
        }

        info!("Loading OCR angle classifier from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!(
                    "Failed to load OCR angle classifier from {}",
                    model_path.display()
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            threshold: 0.9,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Classify a tensor produced by `preprocess_for_classification()`
    pub fn classify(&self, input: &Array4<f32>) -> Result<(TextOrientation, f32)> {
        let expected = [1, 3, CLS_INPUT_HEIGHT as usize, CLS_INPUT_WIDTH as usize];
        if input.shape() != expected {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected {:?}",
                input.shape(),
                expected
            );
        }

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let scores: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("Classifier session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input_value])
                .context("Angle classification failed")?;

            outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?
                .iter()
                .copied()
                .collect()
        };

        let decision = orientation_from_scores(&scores, self.threshold);
        debug!("Angle classifier scores {:?} -> {:?}", scores, decision);
        Ok(decision)
    }
}

/// Pick an orientation from `[score_0deg, score_180deg]`
///
/// Only a confident 180° prediction flips the crop; anything else,
/// including malformed output, is treated as upright.
pub fn orientation_from_scores(scores: &[f32], threshold: f32) -> (TextOrientation, f32) {
    match scores {
        [upright, rotated, ..] if rotated > upright && *rotated > threshold => {
            (TextOrientation::Rotated180, *rotated)
        }
        [upright, ..] => (TextOrientation::Upright, *upright),
        [] => (TextOrientation::Upright, 0.0),
    }
}
