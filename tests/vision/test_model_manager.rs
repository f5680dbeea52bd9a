// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR model manager tests
//!
//! These tests verify that the OcrModelManager:
//! - Starts in the loading state
//! - Accepts exactly one initialization outcome
//! - Hands the same shared engine to every caller
//! - Records load failures instead of aborting

use paddleocr_api::vision::{
    ocr::PaddleOcrConfig, ModelStatus, ModelUnavailable, OcrEngine, OcrError, OcrModelManager,
    RecognizedRegion,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Helper: Engine that counts calls
#[derive(Default)]
struct CountingEngine {
    calls: AtomicUsize,
}

impl OcrEngine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    fn detect(&self, _image_bytes: &[u8]) -> Result<Vec<RecognizedRegion>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod model_manager_tests {
    use super::*;

    // =============================================================================
    // Lifecycle Tests
    // =============================================================================

    /// Test 1: New manager is loading and has no engine
    #[test]
    fn test_new_manager_is_loading() {
        let manager = OcrModelManager::new();
        assert_eq!(manager.status(), ModelStatus::Loading);
        assert!(!manager.is_loaded());
        assert!(matches!(manager.engine(), Err(ModelUnavailable::Loading)));
    }

    /// Test 2: with_engine starts ready
    #[test]
    fn test_with_engine_is_ready() {
        let manager = OcrModelManager::with_engine(Arc::new(CountingEngine::default()));
        assert!(manager.is_loaded());
        assert_eq!(manager.engine().unwrap().name(), "counting");
    }

    /// Test 3: Second install is rejected and the first engine stays
    #[test]
    fn test_install_is_set_once() {
        let manager = OcrModelManager::new();
        let first = Arc::new(CountingEngine::default());

        assert!(manager.install(first.clone()));
        assert!(!manager.install(Arc::new(CountingEngine::default())));

        manager.engine().unwrap().detect(&[]).unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    }

    /// Test 4: Failure is terminal
    #[test]
    fn test_failure_is_terminal() {
        let manager = OcrModelManager::new();
        assert!(manager.mark_failed("boom"));
        assert!(!manager.install(Arc::new(CountingEngine::default())));
        assert_eq!(manager.status(), ModelStatus::Failed("boom".to_string()));
        assert_eq!(
            manager.engine().err(),
            Some(ModelUnavailable::Failed("boom".to_string()))
        );
    }

    // =============================================================================
    // Sharing Tests
    // =============================================================================

    /// Test 5: Every thread sees the same engine instance
    #[test]
    fn test_engine_shared_across_threads() {
        let engine = Arc::new(CountingEngine::default());
        let manager = Arc::new(OcrModelManager::with_engine(engine.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        manager.engine().unwrap().detect(&[]).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.calls.load(Ordering::SeqCst), 80);
    }

    /// Test 6: Concurrent installs race to exactly one winner
    #[test]
    fn test_concurrent_install_single_winner() {
        let manager = Arc::new(OcrModelManager::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.install(Arc::new(CountingEngine::default())))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|installed| *installed)
            .count();

        assert_eq!(winners, 1);
        assert!(manager.is_loaded());
    }

    // =============================================================================
    // Loading Tests
    // =============================================================================

    /// Test 7: Loading from an empty directory records the missing file
    #[tokio::test]
    async fn test_load_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OcrModelManager::new();

        let config = PaddleOcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(manager.load(config).await);

        match manager.status() {
            ModelStatus::Failed(reason) => assert!(reason.contains("det_model.onnx")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    /// Test 8: load does not overwrite an installed engine
    #[tokio::test]
    async fn test_load_after_install_is_ignored() {
        let manager = OcrModelManager::with_engine(Arc::new(CountingEngine::default()));
        let config = PaddleOcrConfig {
            model_dir: "/nonexistent".into(),
            ..Default::default()
        };
        assert!(!manager.load(config).await);
        assert!(manager.is_loaded());
    }
}
