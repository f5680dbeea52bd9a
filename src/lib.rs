// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod version;
pub mod vision;

pub use api::{create_app, start_server, AppState};
pub use config::ServiceConfig;
pub use vision::{OcrEngine, OcrError, OcrModelManager, RecognizedRegion};
