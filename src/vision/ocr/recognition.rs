// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition model
//!
//! This module provides the text recognition component of PaddleOCR.
//! It recognizes text content from cropped text regions.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array4, ArrayView2, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::REC_INPUT_HEIGHT;

/// Recognition model input height
pub const RECOGNITION_INPUT_HEIGHT: u32 = REC_INPUT_HEIGHT; // 48

/// Placeholder stored at the CTC blank index; never emitted
const CTC_BLANK: char = '\0';

/// Recognized text with confidence score
#[derive(Debug, Clone)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Overall confidence score (0.0-1.0)
    pub confidence: f32,
    /// Per-character confidences
    pub char_confidences: Vec<f32>,
}

impl RecognizedText {
    pub fn new(text: String, confidence: f32) -> Self {
        Self {
            text,
            confidence,
            char_confidences: Vec::new(),
        }
    }

    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// PaddleOCR text recognition model
///
/// Uses the PP-OCR CRNN recognition model to extract text from cropped images.
#[derive(Clone)]
pub struct OcrRecognitionModel {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Character dictionary for CTC decoding (index 0 is the blank)
    dictionary: Arc<Vec<char>>,
    /// Model input name
    input_name: String,
}

impl std::fmt::Debug for OcrRecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRecognitionModel")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OcrRecognitionModel {
    /// Load the OCR recognition model and its character dictionary
    ///
    /// # Errors
    /// Returns error if either file is missing, the dictionary cannot be
    /// read, or ONNX Runtime cannot build a session.
    pub fn load<P: AsRef<Path>, D: AsRef<Path>>(
        model_path: P,
        dict_path: D,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!(
                "OCR character dictionary not found: {}",
                dict_path.display()
            );
        }

        info!(
            "Loading OCR recognition model from {}",
            model_path.display()
        );

        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} characters",
            dictionary.len()
        );

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
                    "Failed to load OCR recognition model from {}",
                    model_path.display()
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        debug!("Recognition model loaded - input: {}", input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
        })
    }

    /// Get the dictionary size (including the blank)
    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Recognize text from a preprocessed image tensor of shape [1, 3, 48, W]
    ///
    /// The input should come from `preprocess_for_recognition()`.
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedText> {
        let shape = input.shape();
        if shape.len() != 4
            || shape[0] != 1
            || shape[1] != 3
            || shape[2] != RECOGNITION_INPUT_HEIGHT as usize
            || shape[3] < 4
        {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape,
                RECOGNITION_INPUT_HEIGHT
            );
        }

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let output = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("Recognition session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input_value])
                .context("Recognition inference failed")?;

            outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?
                .to_owned()
        };

        debug!("Recognition output shape: {:?}", output.shape());

        // [batch, seq_len, num_classes] or [seq_len, num_classes]
        let view = match output.ndim() {
            3 if output.shape()[0] > 0 => output.index_axis(Axis(0), 0),
            2 => output.view(),
            _ => anyhow::bail!("Unexpected output shape: {:?}", output.shape()),
        };
        let probs = view
            .into_dimensionality::<Ix2>()
            .context("Unexpected recognition output rank")?;

        Ok(ctc_greedy_decode(probs, &self.dictionary))
    }
}

/// Load a PaddleOCR character dictionary
///
/// One character per line. Index 0 is reserved for the CTC blank and a
/// trailing space is appended when the file does not list one.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open dictionary: {}", path.as_ref().display()))?;

    let reader = BufReader::new(file);
    let mut dictionary = vec![CTC_BLANK];

    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        let line = line.trim_end_matches('\r');
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    if !dictionary[1..].contains(&' ') {
        dictionary.push(' ');
    }

    Ok(dictionary)
}

/// CTC greedy (best path) decoding with blank removal and repeat collapsing
///
/// Rows that are not already probability distributions are softmaxed first.
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, dictionary: &[char]) -> RecognizedText {
    let mut text = String::new();
    let mut char_confidences = Vec::new();
    let mut prev_index: Option<usize> = None;

    for row in probs.outer_iter() {
        let is_distribution = row.iter().all(|&p| (0.0..=1.0).contains(&p));

        let (max_index, max_value) = row
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        let max_prob = if is_distribution {
            max_value
        } else {
            let denom: f32 = row.iter().map(|&v| (v - max_value).exp()).sum();
            1.0 / denom
        };

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                char_confidences.push(max_prob);
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    let confidence = if char_confidences.is_empty() {
        0.0
    } else {
        (char_confidences.iter().sum::<f32>() / char_confidences.len() as f32).clamp(0.0, 1.0)
    };

    RecognizedText {
        text,
        confidence,
        char_confidences,
    }
}
