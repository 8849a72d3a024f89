// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::cache::{DETAIL_TTL, SEARCH_TTL};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and publish the cache TTLs.
    pub fn init() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!("icon_cache_hits_total", "Cache lookups served from a fresh entry");
        describe_counter!("icon_cache_misses_total", "Cache lookups that were absent or expired");
        describe_counter!("icon_source_errors_total", "Failed searches per source");
        describe_counter!(
            "icon_transport_fallbacks_total",
            "Delivery mechanisms that failed before a fallback was tried"
        );
        describe_counter!("icon_imports_total", "Icons written to the emoji store");

        gauge!("icon_cache_ttl_ms", "cache" => "search").set(SEARCH_TTL.as_millis() as f64);
        gauge!("icon_cache_ttl_ms", "cache" => "detail").set(DETAIL_TTL.as_millis() as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
