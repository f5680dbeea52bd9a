// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use paddleocr_api::{
    api::{start_server, AppState},
    config::ServiceConfig,
    version,
    vision::OcrModelManager,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::parse();
    config.validate().context("Invalid configuration")?;

    println!("🚀 Starting {}...\n", version::get_version_string());
    println!("📂 Model directory: {}", config.model_dir.display());
    println!("🌐 Language: {}", config.lang);
    println!(
        "📦 Max upload: {} bytes, allowed types: {}",
        config.max_upload_bytes,
        config
            .allowed_types
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );
    println!();

    // Models load in the background; /health reports progress
    let models = Arc::new(OcrModelManager::new());
    let loader = Arc::clone(&models);
    let engine_config = config.engine_config();
    tokio::spawn(async move {
        loader.load(engine_config).await;
    });

    let state = AppState::new(models, config.upload_policy());

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    println!("✅ Listening on http://{}", bind_address);
    println!("   GET  /health");
    println!("   POST /ocr");
    println!("\nPress Ctrl+C to shutdown...\n");

    start_server(listener, state).await?;

    println!("👋 Goodbye!");
    Ok(())
}
