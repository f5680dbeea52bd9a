// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, root_handler};
use super::ocr::{ocr_handler, UploadPolicy};
use crate::vision::OcrModelManager;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<OcrModelManager>,
    pub policy: Arc<UploadPolicy>,
}

impl AppState {
    pub fn new(models: Arc<OcrModelManager>, policy: UploadPolicy) -> Self {
        Self {
            models,
            policy: Arc::new(policy),
        }
    }
}

/// Build the router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.policy.body_limit();

    Router::new()
        // Service metadata
        .route("/", get(root_handler))
        // Health check
        .route("/health", get(health_handler))
        // OCR endpoint
        .route("/ocr", post(ocr_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
pub async fn start_server(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    let app = create_app(state);

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("⏹️  Shutdown signal received");
}
