// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR pipeline: detection, optional angle classification, recognition
//!
//! Expected model directory layout:
//!
//! ```text
//! <model_dir>/
//!   det_model.onnx
//!   rec_model.onnx
//!   ppocr_keys_v1.txt     (or dict.txt)
//!   cls_model.onnx        (optional)
//!   <lang>/               (optional per-language recognizer)
//!     rec_model.onnx
//!     ppocr_keys_v1.txt   (or dict.txt)
//! ```

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::classification::{AngleClassifier, TextOrientation};
use super::detection::{DetectionParams, OcrDetectionModel};
use super::engine::{OcrEngine, OcrError, Quad, RecognizedRegion};
use super::geometry::distance;
use super::preprocessing::{
    preprocess_for_classification, preprocess_for_detection, preprocess_for_recognition,
    PreprocessInfo, OCR_INPUT_SIZE,
};
use super::recognition::OcrRecognitionModel;
use crate::vision::image_utils::decode_image_bytes;

/// Recognition languages with published PaddleOCR models
pub const SUPPORTED_LANGUAGES: [&str; 4] = ["en", "ch", "japan", "korean"];

/// Dictionary file names, in lookup order
const DICTIONARY_FILES: [&str; 2] = ["ppocr_keys_v1.txt", "dict.txt"];

/// Crops at least this much taller than wide are treated as vertical text
const VERTICAL_TEXT_RATIO: f32 = 1.5;

/// Engine settings
#[derive(Debug, Clone)]
pub struct PaddleOcrConfig {
    pub model_dir: PathBuf,
    pub lang: String,
    pub use_angle_cls: bool,
    /// Regions recognized below this confidence are discarded
    pub drop_score: f32,
    pub cls_threshold: f32,
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
    pub detection: DetectionParams,
}

impl Default for PaddleOcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models/paddleocr-onnx"),
            lang: "en".to_string(),
            use_angle_cls: true,
            drop_score: 0.5,
            cls_threshold: 0.9,
            intra_threads: 1,
            detection: DetectionParams::default(),
        }
    }
}

/// Resolved model file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub detection: PathBuf,
    pub recognition: PathBuf,
    pub dictionary: PathBuf,
    /// Present only when the file exists
    pub classifier: Option<PathBuf>,
}

impl ModelFiles {
    /// Locate the model files for `lang` under `model_dir`
    ///
    /// A `<model_dir>/<lang>/` directory overrides the recognizer and
    /// dictionary; detection and classification are language independent.
    pub fn resolve(model_dir: &Path, lang: &str) -> Self {
        let lang_dir = model_dir.join(lang);
        let rec_dir = if lang_dir.is_dir() {
            lang_dir
        } else {
            model_dir.to_path_buf()
        };

        let dictionary = DICTIONARY_FILES
            .iter()
            .map(|name| rec_dir.join(name))
            .find(|path| path.exists())
            .unwrap_or_else(|| rec_dir.join(DICTIONARY_FILES[0]));

        let classifier = Some(model_dir.join("cls_model.onnx")).filter(|path| path.exists());

        Self {
            detection: model_dir.join("det_model.onnx"),
            recognition: rec_dir.join("rec_model.onnx"),
            dictionary,
            classifier,
        }
    }
}

/// PaddleOCR model for text extraction
///
/// Combines text detection, optional angle classification and recognition.
/// Runs on CPU only. Sessions are internally synchronized, so one instance
/// can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct PaddleOcrModel {
    detection: OcrDetectionModel,
    recognition: OcrRecognitionModel,
    classifier: Option<AngleClassifier>,
    config: PaddleOcrConfig,
}

impl PaddleOcrModel {
    /// Load all models described by `config`
    ///
    /// Blocking; call from `spawn_blocking` when on an async runtime.
    pub fn load(config: &PaddleOcrConfig) -> Result<Self> {
        if !SUPPORTED_LANGUAGES.contains(&config.lang.as_str()) {
            anyhow::bail!(
                "Unsupported OCR language '{}', expected one of {:?}",
                config.lang,
                SUPPORTED_LANGUAGES
            );
        }
        if !config.model_dir.is_dir() {
            anyhow::bail!(
                "OCR model directory not found: {}",
                config.model_dir.display()
            );
        }

        info!(
            "Loading PaddleOCR models from {} (lang={})",
            config.model_dir.display(),
            config.lang
        );

        let files = ModelFiles::resolve(&config.model_dir, &config.lang);
        debug!("Resolved OCR model files: {:?}", files);

        let detection = OcrDetectionModel::load(&files.detection, config.intra_threads)
            .context("Failed to load detection model")?
            .with_params(config.detection);

        let recognition =
            OcrRecognitionModel::load(&files.recognition, &files.dictionary, config.intra_threads)
                .context("Failed to load recognition model")?;

        let classifier = match (config.use_angle_cls, &files.classifier) {
            (true, Some(path)) => Some(
                AngleClassifier::load(path, config.intra_threads)
                    .context("Failed to load angle classifier")?
                    .with_threshold(config.cls_threshold),
            ),
            (true, None) => {
                warn!(
                    "cls_model.onnx not found in {}, angle classification disabled",
                    config.model_dir.display()
                );
                None
            }
            (false, _) => None,
        };

        info!(
            "PaddleOCR ready (dictionary: {} chars, angle classifier: {})",
            recognition.dictionary_size(),
            classifier.is_some()
        );

        Ok(Self {
            detection,
            recognition,
            classifier,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PaddleOcrConfig {
        &self.config
    }

    /// Run the full pipeline on a decoded image
    pub fn process(&self, image: &DynamicImage) -> Result<Vec<RecognizedRegion>> {
        let image = DynamicImage::ImageRgb8(image.to_rgb8());

        let info = PreprocessInfo::new(&image, OCR_INPUT_SIZE);
        let input = preprocess_for_detection(&image);
        let boxes = self.detection.detect(&input, &info)?;

        let mut regions = Vec::with_capacity(boxes.len());
        for text_box in &boxes {
            let Some(crop) = crop_region(&image, &text_box.points) else {
                continue;
            };
            let crop = self.orient(upright_crop(crop))?;

            let recognized = self
                .recognition
                .recognize(&preprocess_for_recognition(&crop))?;

            if recognized.is_empty() || recognized.confidence < self.config.drop_score {
                debug!(
                    "Dropping region '{}' (confidence {:.3})",
                    recognized.text, recognized.confidence
                );
                continue;
            }

            regions.push(RecognizedRegion {
                text: recognized.text,
                confidence: recognized.confidence,
                points: text_box.points,
            });
        }

        debug!(
            "{} of {} detected regions recognized",
            regions.len(),
            boxes.len()
        );

        Ok(regions)
    }

    fn orient(&self, crop: DynamicImage) -> Result<DynamicImage> {
        let Some(classifier) = &self.classifier else {
            return Ok(crop);
        };
        let (orientation, score) = classifier.classify(&preprocess_for_classification(&crop))?;
        Ok(match orientation {
            TextOrientation::Rotated180 => {
                debug!("Rotating upside-down crop (score {:.3})", score);
                crop.rotate180()
            }
            TextOrientation::Upright => crop,
        })
    }
}

impl OcrEngine for PaddleOcrModel {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RecognizedRegion>, OcrError> {
        let (image, info) = decode_image_bytes(image_bytes)?;
        debug!(
            "Decoded {} image {}x{} ({} bytes)",
            info.kind, info.width, info.height, info.size_bytes
        );
        Ok(self.process(&image)?)
    }
}

/// Warp a (possibly rotated) box into an upright crop
///
/// Corners are clamped to the image first. The output is as wide as the
/// longer of the top and bottom edges and as tall as the longer of the
/// left and right edges. Returns `None` when the box has no area.
pub fn crop_region(image: &DynamicImage, points: &Quad) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let [tl, tr, br, bl] =
        (*points).map(|[x, y]| [x.clamp(0.0, width as f32), y.clamp(0.0, height as f32)]);

    let crop_width = distance(tl, tr).max(distance(bl, br)).round() as u32;
    let crop_height = distance(tl, bl).max(distance(tr, br)).round() as u32;
    if crop_width == 0 || crop_height == 0 {
        return None;
    }

    let source: Cow<'_, RgbImage> = match image {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        other => Cow::Owned(other.to_rgb8()),
    };

    let crop = RgbImage::from_fn(crop_width, crop_height, |u, v| {
        let s = (u as f32 + 0.5) / crop_width as f32;
        let t = (v as f32 + 0.5) / crop_height as f32;
        let top = lerp(tl, tr, s);
        let bottom = lerp(bl, br, s);
        let [x, y] = lerp(top, bottom, t);
        sample_bilinear(&source, x, y)
    });

    Some(DynamicImage::ImageRgb8(crop))
}

fn lerp(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Sample at continuous coordinates, pixel centres at +0.5
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let x = (x - 0.5).clamp(0.0, (width - 1) as f32);
    let y = (y - 0.5).clamp(0.0, (height - 1) as f32);

    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (dx, dy) = (x - x0 as f32, y - y0 as f32);

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, channel) in out.iter_mut().enumerate() {
        let value = (1.0 - dx) * (1.0 - dy) * p00[c] as f32
            + dx * (1.0 - dy) * p10[c] as f32
            + (1.0 - dx) * dy * p01[c] as f32
            + dx * dy * p11[c] as f32;
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Turn vertical text lines horizontal before recognition
fn upright_crop(crop: DynamicImage) -> DynamicImage {
    let (width, height) = crop.dimensions();
    if height as f32 >= width as f32 * VERTICAL_TEXT_RATIO {
        crop.rotate270()
    } else {
        crop
    }
}
