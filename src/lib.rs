// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod adapters;
pub mod api;
pub mod cache;
pub mod color;
pub mod error;
pub mod i18n;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod render;
pub mod settings;
pub mod sources;
pub mod storage;
pub mod svg;
pub mod text;
pub mod transport;

use std::sync::Arc;

use axum::Router;

pub use crate::api::router;
pub use crate::error::{MarketError, Result};
pub use crate::orchestrator::{Orchestrator, SearchResults, SourceOutcome};
pub use crate::settings::Settings;

/// Wire settings into an orchestrator and the API router (no metrics route).
pub fn app(settings: Settings) -> (Router, Arc<Orchestrator>) {
    let orchestrator = Arc::new(Orchestrator::from_settings(settings));
    let state = api::AppState::new(orchestrator.clone());
    (api::router(state), orchestrator)
}
