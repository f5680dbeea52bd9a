// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR endpoint tests for POST /ocr
//!
//! These tests verify that the ocr_handler correctly:
//! - Rejects oversized, mistyped, missing and empty uploads before the
//!   engine runs
//! - Forwards the exact uploaded bytes to the engine once
//! - Maps engine output and failures into the response schema
//! - Keeps concurrent requests independent

use axum::http::StatusCode;
use image::ImageFormat;
use paddleocr_api::{
    api::UploadPolicy,
    vision::{ImageError, ImageKind, OcrEngine, OcrError, OcrModelManager, RecognizedRegion},
};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

use super::helpers::*;

const GIF_HEADER: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00";

/// Helper: Engine that panics mid-inference
struct PanickingEngine;

impl OcrEngine for PanickingEngine {
    fn name(&self) -> &str {
        "panicking"
    }

    fn detect(&self, _image_bytes: &[u8]) -> Result<Vec<RecognizedRegion>, OcrError> {
        panic!("inference crashed")
    }
}

fn hello_region() -> RecognizedRegion {
    RecognizedRegion {
        text: "HELLO".to_string(),
        confidence: 0.97,
        points: [[12.0, 8.0], [96.0, 8.0], [96.0, 30.0], [12.0, 30.0]],
    }
}

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    // =============================================================================
    // Validation Tests
    // =============================================================================

    /// Test 1: Oversized upload is rejected and the engine never runs
    #[tokio::test]
    async fn test_oversized_upload_rejected_before_engine() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);

        let policy = UploadPolicy::new(1024, ImageKind::ALL);
        let app = app_with_policy(engine, policy);

        let mut data = png_bytes(4, 4);
        data.resize(4096, 0);

        let response = app
            .oneshot(upload_request("big.png", "image/png", &data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "payload_too_large");
        assert!(json["detail"].as_str().unwrap().contains("1024"));
    }

    /// Test 2: Upload exactly at the cap is accepted
    #[tokio::test]
    async fn test_upload_at_size_limit_accepted() {
        let data = png_bytes(8, 8);

        let mut engine = MockEngine::new();
        engine.expect_detect().times(1).returning(|_| Ok(vec![]));

        let policy = UploadPolicy::new(data.len(), ImageKind::ALL);
        let app = app_with_policy(engine, policy);

        let response = app
            .oneshot(upload_request("exact.png", "image/png", &data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Test 3: Disallowed MIME type is rejected with a format error
    #[tokio::test]
    async fn test_disallowed_mime_type_rejected() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("doc.png", "application/pdf", &png_bytes(4, 4)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "unsupported_format");
        assert!(json["detail"]
            .as_str()
            .unwrap()
            .contains("application/pdf"));
    }

    /// Test 4: GIF is not in the default allow-list
    #[tokio::test]
    async fn test_gif_rejected() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("anim.gif", "image/gif", GIF_HEADER))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    /// Test 5: A format removed from the allow-list is rejected even when
    /// the client declares nothing
    #[tokio::test]
    async fn test_restricted_policy_checks_content() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);

        let policy = UploadPolicy::new(1024 * 1024, [ImageKind::Jpeg]);
        let app = app_with_policy(engine, policy);

        let response = app
            .oneshot(ocr_request(multipart_body(
                "file",
                None,
                None,
                &png_bytes(4, 4),
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    /// Test 6: Request without a `file` field
    #[tokio::test]
    async fn test_missing_file_field() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);
        let app = app_with_engine(engine);

        let response = app
            .oneshot(ocr_request(multipart_body(
                "image",
                Some("scan.png"),
                Some("image/png"),
                &png_bytes(4, 4),
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "missing_file");
    }

    /// Test 7: Empty file
    #[tokio::test]
    async fn test_empty_file() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("empty.png", "image/png", &[]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "empty_file");
    }

    /// Test 8: Non-multipart request body
    #[tokio::test]
    async fn test_non_multipart_request() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);
        let app = app_with_engine(engine);

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/ocr")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"image": "abc"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "invalid_multipart");
    }

    // =============================================================================
    // Engine Invocation Tests
    // =============================================================================

    /// Test 9: Image with no text returns success with empty results
    #[tokio::test]
    async fn test_no_text_returns_empty_results() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(1).returning(|_| Ok(vec![]));
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("blank.png", "image/png", &png_bytes(32, 32)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["results"].as_array().unwrap().len(), 0);
        assert!(json["processing_time_ms"].as_f64().unwrap() >= 0.0);
    }

    /// Test 10: Known text is returned with its box untouched
    #[tokio::test]
    async fn test_known_text_returned() {
        let mut engine = MockEngine::new();
        engine
            .expect_detect()
            .times(1)
            .returning(|_| Ok(vec![hello_region()]));
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("hello.png", "image/png", &png_bytes(120, 40)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["text"], "HELLO");

        let confidence = results[0]["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert!((confidence - 0.97).abs() < 1e-6);

        let points = results[0]["box"].as_array().unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], serde_json::json!([12.0, 8.0]));
        assert_eq!(points[2], serde_json::json!([96.0, 30.0]));
    }

    /// Test 11: The engine receives the uploaded bytes unchanged
    #[tokio::test]
    async fn test_engine_receives_exact_bytes() {
        let data = image_bytes(6, 6, ImageFormat::Bmp);
        let expected = data.clone();

        let mut engine = MockEngine::new();
        engine
            .expect_detect()
            .withf(move |bytes| bytes.to_vec() == expected)
            .times(1)
            .returning(|_| Ok(vec![]));
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("scan.bmp", "image/bmp", &data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Test 12: Generic content type falls back to content sniffing
    #[tokio::test]
    async fn test_octet_stream_upload_accepted() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(1).returning(|_| Ok(vec![]));
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request(
                "photo.jpg",
                "application/octet-stream",
                &image_bytes(8, 8, ImageFormat::Jpeg),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Test 13: Out-of-range engine confidence is clamped
    #[tokio::test]
    async fn test_confidence_clamped() {
        let mut engine = MockEngine::new();
        engine.expect_detect().returning(|_| {
            Ok(vec![RecognizedRegion {
                confidence: 1.4,
                ..hello_region()
            }])
        });
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("hello.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["results"][0]["confidence"], 1.0);
    }

    /// Test 14: processing_time_ms covers the engine call
    #[tokio::test]
    async fn test_processing_time_measures_engine_call() {
        let mut engine = MockEngine::new();
        engine.expect_detect().returning(|_| {
            std::thread::sleep(Duration::from_millis(25));
            Ok(vec![])
        });
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("slow.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert!(json["processing_time_ms"].as_f64().unwrap() >= 25.0);
    }

    // =============================================================================
    // Failure Tests
    // =============================================================================

    /// Test 15: Engine failure becomes a structured 500
    #[tokio::test]
    async fn test_engine_failure_is_structured() {
        let mut engine = MockEngine::new();
        engine.expect_detect().returning(|_| {
            Err(OcrError::InvalidImage(ImageError::DecodeFailed(
                "truncated stream".to_string(),
            )))
        });
        let app = app_with_engine(engine);

        let response = app
            .oneshot(upload_request("broken.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "ocr_failed");
        assert!(json["detail"].as_str().unwrap().contains("truncated stream"));
    }

    /// Test 16: A panicking engine does not take the server down
    #[tokio::test]
    async fn test_engine_panic_is_contained() {
        let app = app_with_engine(PanickingEngine);

        let response = app
            .clone()
            .oneshot(upload_request("crash.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "internal_error");

        // Router still serves requests
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Test 17: Model not loaded yet yields 503
    #[tokio::test]
    async fn test_model_loading_returns_503() {
        let app = app_with_manager(Arc::new(OcrModelManager::new()));

        let response = app
            .oneshot(upload_request("scan.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "service_unavailable");
    }

    /// Test 18: Failed model load yields 503 with the reason
    #[tokio::test]
    async fn test_model_failed_returns_503() {
        let models = Arc::new(OcrModelManager::new());
        models.mark_failed("det_model.onnx not found");
        let app = app_with_manager(models);

        let response = app
            .oneshot(upload_request("scan.png", "image/png", &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("det_model.onnx"));
    }

    // =============================================================================
    // Concurrency Tests
    // =============================================================================

    /// Test 19: Concurrent requests each get their own results
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_independent() {
        let app = app_with_engine(DimensionsEngine);

        let sizes: Vec<(u32, u32)> = (1..=16).map(|i| (10 + i, 5 + 2 * i)).collect();
        let requests = sizes.iter().map(|&(w, h)| {
            let app = app.clone();
            async move {
                let response = app
                    .oneshot(upload_request("img.png", "image/png", &png_bytes(w, h)))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                json_body(response).await
            }
        });

        let bodies = futures_util::future::join_all(requests).await;

        for (&(w, h), json) in sizes.iter().zip(bodies) {
            let results = json["results"].as_array().unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0]["text"], format!("{}x{}", w, h));
            assert_eq!(results[0]["box"][2], serde_json::json!([w as f64, h as f64]));
        }
    }

    // =============================================================================
    // Body Limit Tests
    // =============================================================================

    /// Test 20: A multi-megabyte image passes the request body limit
    #[tokio::test]
    async fn test_large_image_within_default_limit() {
        // Uncompressed 1024x1024 RGB bitmap, larger than axum's 2 MiB default
        let data = image_bytes(1024, 1024, ImageFormat::Bmp);
        assert!(data.len() > 3 * 1024 * 1024);

        let app = app_with_engine(DimensionsEngine);
        let response = app
            .oneshot(upload_request("scan.bmp", "image/bmp", &data))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["results"][0]["text"], "1024x1024");
    }

    /// Test 21: A request body over the limit is 413 even when the file is small
    #[tokio::test]
    async fn test_request_body_over_limit_rejected() {
        let mut engine = MockEngine::new();
        engine.expect_detect().times(0);

        let policy = UploadPolicy::new(1024, ImageKind::ALL);
        let padding = vec![b'a'; policy.body_limit() + 1];
        let app = app_with_policy(engine, policy);

        let mut body = multipart_body("padding", None, None, &padding);
        // Drop the closing delimiter and append the file part
        body.truncate(body.len() - format!("--{}--\r\n", BOUNDARY).len());
        body.extend_from_slice(&multipart_body(
            "file",
            Some("small.png"),
            Some("image/png"),
            &png_bytes(4, 4),
        ));

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "payload_too_large");
    }
}
