// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::Json;
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::request::read_upload;
use super::response::{DetectionResult, OcrResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{OcrEngine, RecognizedRegion};

/// POST /ocr - Extract text from an uploaded image
///
/// # Request
/// `multipart/form-data` with the image in the `file` field.
///
/// # Response
/// - `success`: always `true` on 200
/// - `results`: `[{text, confidence, box}]`, empty when no text is found
/// - `processing_time_ms`: duration of the OCR call itself
///
/// # Errors
/// - 400 Bad Request: missing or empty file, malformed multipart body
/// - 413 Payload Too Large: file exceeds the configured cap
/// - 415 Unsupported Media Type: file type not in the allow-list
/// - 503 Service Unavailable: OCR model not loaded
/// - 500 Internal Server Error: OCR processing failed
pub async fn ocr_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "ocr_request",
        %request_id,
        file_name = field::Empty,
        size_bytes = field::Empty
    );

    process_upload(state, multipart).instrument(span).await
}

async fn process_upload(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| logged(ApiError::InvalidMultipart(e.body_text())))?;

    // 1. Read and validate the upload
    let upload = read_upload(&mut multipart, &state.policy)
        .await
        .map_err(logged)?;

    let span = Span::current();
    span.record("file_name", upload.file_name.as_deref().unwrap_or("<unnamed>"));
    span.record("size_bytes", upload.len());

    let kind = state.policy.validate(&upload).map_err(logged)?;
    debug!("Accepted {} upload", kind);

    // 2. Get the OCR engine
    let engine = state.models.engine().map_err(logged)?;

    // 3. Run OCR off the async runtime
    let (regions, elapsed) = run_engine(engine, upload.bytes).await?;
    let processing_time_ms = elapsed.as_secs_f64() * 1000.0;

    info!(
        "OCR complete: {} regions, {:.1}ms",
        regions.len(),
        processing_time_ms
    );

    // 4. Convert engine output to the response format
    let results: Vec<DetectionResult> = regions.into_iter().map(DetectionResult::from).collect();

    Ok(Json(OcrResponse::new(results, processing_time_ms)))
}

/// Invoke the engine once on the blocking pool, timing only the call
async fn run_engine(
    engine: Arc<dyn OcrEngine>,
    bytes: Bytes,
) -> Result<(Vec<RecognizedRegion>, Duration), ApiError> {
    let outcome = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let result = engine.detect(&bytes);
        (result, started.elapsed())
    })
    .await
    .map_err(|e| logged(ApiError::InternalError(format!("OCR task failed: {}", e))))?;

    match outcome {
        (Ok(regions), elapsed) => Ok((regions, elapsed)),
        (Err(e), _) => Err(logged(e)),
    }
}

/// Log a failed request at a level matching who is at fault
fn logged(err: impl Into<ApiError>) -> ApiError {
    let err = err.into();
    if err.is_client_error() {
        warn!("OCR request rejected: {}", err);
    } else {
        error!("OCR request failed: {}", err);
    }
    err
}
