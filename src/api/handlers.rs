// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::http_server::AppState;
use crate::version;
use crate::vision::ModelStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub paddleocr_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn from_status(status: &ModelStatus) -> Self {
        let (loaded, error) = match status {
            ModelStatus::Ready => (true, None),
            ModelStatus::Loading => (false, None),
            ModelStatus::Failed(reason) => (false, Some(reason.clone())),
        };

        Self {
            status: if loaded { "healthy" } else { "unhealthy" }.to_string(),
            paddleocr_loaded: loaded,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointsInfo {
    pub health: String,
    pub ocr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub endpoints: EndpointsInfo,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: version::SERVICE_NAME.to_string(),
            version: version::VERSION.to_string(),
            endpoints: EndpointsInfo {
                health: "GET /health".to_string(),
                ocr: "POST /ocr".to_string(),
            },
        }
    }
}

/// GET /health - Report whether the OCR model finished loading
///
/// Always 200; `status` is `unhealthy` while loading or after a failed load.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_status(&state.models.status()))
}

/// GET / - Service metadata
pub async fn root_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
