// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Set-once handle to the OCR engine
//!
//! The manager is created before the server starts, shared through axum
//! state, and filled exactly once when model loading finishes (or fails).

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::vision::ocr::{OcrEngine, PaddleOcrConfig, PaddleOcrModel};

/// Returned when the engine cannot serve requests
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelUnavailable {
    #[error("OCR model is still loading")]
    Loading,

    #[error("OCR model failed to load: {0}")]
    Failed(String),
}

/// Current lifecycle state of the OCR model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Shared, set-once OCR engine slot
#[derive(Default)]
pub struct OcrModelManager {
    slot: OnceLock<Result<Arc<dyn OcrEngine>, String>>,
}

impl fmt::Debug for OcrModelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrModelManager")
            .field("status", &self.status())
            .finish()
    }
}

impl OcrModelManager {
    /// Create an empty manager in the `Loading` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that is already `Ready`
    pub fn with_engine(engine: Arc<dyn OcrEngine>) -> Self {
        let manager = Self::new();
        let _ = manager.slot.set(Ok(engine));
        manager
    }

    /// Load PaddleOCR on the blocking pool and record the outcome
    ///
    /// Returns `false` if the slot was already filled.
    pub async fn load(&self, config: PaddleOcrConfig) -> bool {
        let model_dir = config.model_dir.display().to_string();
        let outcome = tokio::task::spawn_blocking(move || PaddleOcrModel::load(&config)).await;

        match outcome {
            Ok(Ok(model)) => {
                tracing::info!("✅ PaddleOCR model loaded from {}", model_dir);
                self.install(Arc::new(model))
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Failed to load OCR model from {}: {:#}", model_dir, e);
                self.mark_failed(format!("{:#}", e))
            }
            Err(e) => {
                tracing::error!("❌ OCR model loading task aborted: {}", e);
                self.mark_failed(format!("model loading task aborted: {}", e))
            }
        }
    }

    /// Install a loaded engine; `false` if the slot was already filled
    pub fn install(&self, engine: Arc<dyn OcrEngine>) -> bool {
        let installed = self.slot.set(Ok(engine)).is_ok();
        if !installed {
            tracing::warn!("OCR engine already initialized, ignoring install");
        }
        installed
    }

    /// Record a load failure; `false` if the slot was already filled
    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let recorded = self.slot.set(Err(reason.into())).is_ok();
        if !recorded {
            tracing::warn!("OCR engine already initialized, ignoring failure");
        }
        recorded
    }

    pub fn status(&self) -> ModelStatus {
        match self.slot.get() {
            None => ModelStatus::Loading,
            Some(Ok(_)) => ModelStatus::Ready,
            Some(Err(reason)) => ModelStatus::Failed(reason.clone()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// Get the engine if it is ready
    pub fn engine(&self) -> Result<Arc<dyn OcrEngine>, ModelUnavailable> {
        match self.slot.get() {
            Some(Ok(engine)) => Ok(Arc::clone(engine)),
            Some(Err(reason)) => Err(ModelUnavailable::Failed(reason.clone())),
            None => Err(ModelUnavailable::Loading),
        }
    }
}
