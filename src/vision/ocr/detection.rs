// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection model
//!
//! This module provides the text detection component of PaddleOCR.
//! It turns the DB probability map into text quadrilaterals expressed in
//! original image coordinates.

use anyhow::{anyhow, Context, Result};
use ndarray::{Array4, ArrayView2, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::engine::Quad;
use super::geometry::{min_area_rect, order_points, Point};
use super::preprocessing::PreprocessInfo;

/// Boxes whose top edges differ by less than this are treated as one line
const SAME_LINE_TOLERANCE: f32 = 10.0;

/// Post-processing parameters for the DB probability map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Pixel probability threshold for the binary text mask
    pub threshold: f32,
    /// Minimum mean probability of a region to keep it
    pub box_threshold: f32,
    /// DB unclip expansion ratio
    pub unclip_ratio: f32,
    /// Minimum number of mask pixels in a region
    pub min_region_pixels: usize,
    /// Minimum side length of a region (probability map pixels)
    pub min_side: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_region_pixels: 10,
            min_side: 3.0,
        }
    }
}

/// A detected text box with location and confidence
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// Corners in original image coordinates, clockwise from top-left
    pub points: Quad,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

impl TextBox {
    pub fn left(&self) -> f32 {
        self.points.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min)
    }

    pub fn top(&self) -> f32 {
        self.points.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min)
    }

    pub fn right(&self) -> f32 {
        self.points.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn bottom(&self) -> f32 {
        self.points.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn width(&self) -> f32 {
        self.right() - self.left()
    }

    pub fn height(&self) -> f32 {
        self.bottom() - self.top()
    }

    /// Check if this text box is valid (reasonable dimensions)
    pub fn is_valid(&self) -> bool {
        self.width() >= 1.0 && self.height() >= 1.0 && self.confidence > 0.0
    }
}

/// PaddleOCR text detection model
///
/// Uses the PP-OCR DB detection model to find text regions in images.
/// Runs on CPU only.
#[derive(Clone)]
pub struct OcrDetectionModel {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Post-processing parameters
    params: DetectionParams,
}

impl std::fmt::Debug for OcrDetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrDetectionModel")
            .field("input_name", &self.input_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OcrDetectionModel {
    /// Load the OCR detection model from a file (det_model.onnx)
    ///
    /// # Errors
    /// Returns error if the model file is missing or ONNX Runtime cannot
    /// build a session from it.
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR detection model not found: {}", model_path.display());
        }

        info!("Loading OCR detection model from {}", model_path.display());

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
                    "Failed to load OCR detection model from {}",
                    model_path.display()
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        debug!("Detection model loaded - input: {}", input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            params: DetectionParams::default(),
        })
    }

    /// Override the post-processing parameters
    pub fn with_params(mut self, params: DetectionParams) -> Self {
        self.params = DetectionParams {
            threshold: params.threshold.clamp(0.0, 1.0),
            box_threshold: params.box_threshold.clamp(0.0, 1.0),
            ..params
        };
        self
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Run text detection on a preprocessed image tensor
    ///
    /// `input` must come from `preprocess_for_detection()` and `info` must
    /// describe that same preprocessing so boxes can be mapped back.
    pub fn detect(&self, input: &Array4<f32>, info: &PreprocessInfo) -> Result<Vec<TextBox>> {
        let shape = input.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }
        let (input_height, input_width) = (shape[2], shape[3]);

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let probability_map = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("Detection session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input_value])
                .context("Detection inference failed")?;

            outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?
                .to_owned()
        };

        debug!("Detection output shape: {:?}", probability_map.shape());

        let mut view = probability_map.view();
        while view.ndim() > 2 {
            if view.shape()[0] == 0 {
                anyhow::bail!("Empty detection output: {:?}", probability_map.shape());
            }
            view = view.index_axis_move(Axis(0), 0);
        }
        let map = view
            .into_dimensionality::<Ix2>()
            .context("Unexpected detection output rank")?;

        let boxes = boxes_from_probability_map(
            map,
            &self.params,
            info,
            (input_height, input_width),
        );

        debug!("Detected {} text regions", boxes.len());

        Ok(boxes)
    }
}

/// Convert a DB probability map into sorted text boxes
///
/// `input_size` is the (height, width) of the tensor fed to the model; the
/// map may be a downscaled version of it.
pub fn boxes_from_probability_map(
    map: ArrayView2<f32>,
    params: &DetectionParams,
    info: &PreprocessInfo,
    input_size: (usize, usize),
) -> Vec<TextBox> {
    let (map_height, map_width) = map.dim();
    if map_height == 0 || map_width == 0 {
        return Vec::new();
    }

    let scale_y = input_size.0 as f32 / map_height as f32;
    let scale_x = input_size.1 as f32 / map_width as f32;

    let mut visited = vec![vec![false; map_width]; map_height];
    let mut boxes = Vec::new();

    for y in 0..map_height {
        for x in 0..map_width {
            if visited[y][x] || map[[y, x]] < params.threshold {
                continue;
            }

            let region = flood_fill(&map, &mut visited, x, y, params.threshold);
            if region.count < params.min_region_pixels {
                continue;
            }

            let score = region.sum / region.count as f32;
            if score < params.box_threshold {
                continue;
            }

            let Some(rect) = min_area_rect(&region.outline()) else {
                continue;
            };
            if rect.min_side() < params.min_side {
                continue;
            }

            let distance = unclip_distance(rect.width, rect.height, params.unclip_ratio);
            let points = rect.expanded(distance).corners().map(|[px, py]| {
                let (ox, oy) = info.map_to_original(px * scale_x, py * scale_y);
                [ox, oy]
            });

            let text_box = TextBox {
                points: order_points(points),
                confidence: score.min(1.0),
            };
            if text_box.is_valid() {
                boxes.push(text_box);
            }
        }
    }

    sort_reading_order(&mut boxes);
    boxes
}

/// DB unclip offset for a rectangle
///
/// `distance = area * ratio / perimeter`
pub fn unclip_distance(width: f32, height: f32, ratio: f32) -> f32 {
    let perimeter = 2.0 * (width + height);
    if perimeter <= f32::EPSILON {
        return 0.0;
    }
    width * height * ratio / perimeter
}

/// Sort boxes top-to-bottom, then left-to-right within a line
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        a.top()
            .partial_cmp(&b.top())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.left().partial_cmp(&b.left()).unwrap_or(Ordering::Equal))
    });

    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let same_line = (boxes[j + 1].top() - boxes[j].top()).abs() < SAME_LINE_TOLERANCE;
            if same_line && boxes[j + 1].left() < boxes[j].left() {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

struct Region {
    /// Leftmost and rightmost pixel of each row
    rows: BTreeMap<usize, (usize, usize)>,
    count: usize,
    sum: f32,
}

impl Region {
    /// Pixel-corner outline whose convex hull covers the whole region
    fn outline(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.rows.len() * 4);
        for (&y, &(x0, x1)) in &self.rows {
            let (left, right) = (x0 as f32, (x1 + 1) as f32);
            let (top, bottom) = (y as f32, (y + 1) as f32);
            points.extend([[left, top], [right, top], [left, bottom], [right, bottom]]);
        }
        points
    }
}

/// 4-connected flood fill over pixels at or above `threshold`
fn flood_fill(
    map: &ArrayView2<f32>,
    visited: &mut [Vec<bool>],
    start_x: usize,
    start_y: usize,
    threshold: f32,
) -> Region {
    let (height, width) = map.dim();
    let mut stack = vec![(start_x, start_y)];
    let mut region = Region {
        rows: BTreeMap::new(),
        count: 0,
        sum: 0.0,
    };

    while let Some((x, y)) = stack.pop() {
        if visited[y][x] {
            continue;
        }
        let prob = map[[y, x]];
        if prob < threshold {
            continue;
        }

        visited[y][x] = true;
        region.count += 1;
        region.sum += prob;
        let extent = region.rows.entry(y).or_insert((x, x));
        extent.0 = extent.0.min(x);
        extent.1 = extent.1.max(x);

        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    region
}
