// src/adapters/mod.rs
//! Source adapters: one scraper per catalog behind a common trait.
//!
//! Adapters are stateless apart from their HTTP handle. Caching, fan-out and
//! error aggregation live in the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::i18n::I18n;
use crate::models::{IconDetail, IconSummary};
use crate::sources::Source;
use crate::transport::HttpFetch;

pub mod cainiao;
pub mod iconfont;

pub use cainiao::CainiaoSource;
pub use iconfont::IconfontSource;

/// Per-call knobs that come from settings rather than from the adapter.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext {
    /// Display cap for this source; adapters may request more to absorb dedup loss.
    pub max_results: u32,
    /// Locale used for fallback labels ("unknown author", "unlabeled", ...).
    pub i18n: I18n,
}

impl Default for FetchContext {
    fn default() -> Self {
        Self {
            max_results: crate::settings::DEFAULT_MAX_PER_SOURCE,
            i18n: I18n::default(),
        }
    }
}

#[async_trait]
pub trait IconSource: Send + Sync {
    fn descriptor(&self) -> &'static Source;

    /// Search one catalog. Duplicate ids within the response are dropped.
    async fn search(&self, keyword: &str, ctx: &FetchContext) -> Result<Vec<IconSummary>>;

    /// Resolve the full record for one search hit.
    async fn detail(&self, summary: &IconSummary, ctx: &FetchContext) -> Result<IconDetail>;
}

/// Adapters for every built-in catalog, in display order.
pub fn builtin(http: Arc<dyn HttpFetch>) -> Vec<Arc<dyn IconSource>> {
    vec![
        Arc::new(IconfontSource::new(http.clone())),
        Arc::new(CainiaoSource::new(http)),
    ]
}

/// Loose JSON scalar to a whitespace-collapsed string; null/objects become "".
pub(crate) fn json_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => crate::text::collapse_ws(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Raw (untrimmed-inside) JSON string, used for markup fields.
pub(crate) fn json_raw(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Integer from a number or numeric string; fractional values truncate.
pub(crate) fn json_int(v: Option<&Value>, default: i64) -> i64 {
    match v {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
            .unwrap_or(default),
        _ => default,
    }
}

/// First non-empty candidate.
pub(crate) fn first_non_empty<I>(candidates: I) -> String
where
    I: IntoIterator<Item = String>,
{
    candidates
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
