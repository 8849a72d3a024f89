// src/orchestrator.rs
//! Long-lived owner of the per-session state: adapters, caches, settings and
//! the emoji store. Every user-initiated operation goes through here.
//!
//! Search fans out to all requested sources concurrently and settles each one
//! independently; one failing catalog never hides another's results.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::adapters::{self, FetchContext, IconSource};
use crate::cache::{self, Clock, DetailCache, SearchCache, SystemClock};
use crate::color::build_palette;
use crate::error::{MarketError, Result};
use crate::i18n::I18n;
use crate::models::{IconDetail, IconSummary, ImportDecision, PersistedIcon};
use crate::settings::{Settings, StorageKind};
use crate::sources::{self, Source};
use crate::storage::{self, EmojiStore, FsStore, HostApiStore};
use crate::svg;
use crate::text::{collapse_ws, file_id, https_url, slugify};
use crate::transport::{FallbackChain, HttpFetch};

pub const SVG_MIME: &str = "image/svg+xml";

/// Settled result of one source's search.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub items: Arc<Vec<IconSummary>>,
    pub error: Option<MarketError>,
}

impl SourceOutcome {
    pub fn ok(items: Arc<Vec<IconSummary>>) -> Self {
        Self { items, error: None }
    }

    pub fn failed(error: MarketError) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            error: Some(error),
        }
    }
}

/// One entry per requested source id.
pub type SearchResults = BTreeMap<String, SourceOutcome>;

/// What the import dialog shows before the user confirms.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewView {
    pub svg: String,
    pub palette: Vec<String>,
    pub default_color: String,
}

pub struct Orchestrator {
    adapters: Vec<Arc<dyn IconSource>>,
    settings: RwLock<Settings>,
    search_cache: SearchCache,
    detail_cache: DetailCache,
    store: EmojiStore,
    http: Arc<dyn HttpFetch>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        adapters: Vec<Arc<dyn IconSource>>,
        http: Arc<dyn HttpFetch>,
        store: EmojiStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            adapters,
            search_cache: cache::search_cache(clock.clone()),
            detail_cache: cache::detail_cache(clock.clone()),
            settings: RwLock::new(settings),
            store,
            http,
            clock,
        }
    }

    /// Production wiring: standard fallback chain, built-in adapters, and the
    /// storage backend named by the settings.
    pub fn from_settings(settings: Settings) -> Self {
        let http: Arc<dyn HttpFetch> = Arc::new(FallbackChain::standard(settings.host.clone()));
        let store = match settings.storage.kind {
            StorageKind::Fs => {
                EmojiStore::for_fs(Arc::new(FsStore::new(settings.storage.root.clone())))
            }
            StorageKind::Host => EmojiStore::for_host(
                Arc::new(HostApiStore::new(settings.host.clone())),
                &settings.storage.root,
            ),
        };
        info!(
            backend = store.backend_name(),
            root = %settings.storage.root,
            "orchestrator ready"
        );
        Self::new(
            settings,
            adapters::builtin(http.clone()),
            http,
            store,
            Arc::new(SystemClock),
        )
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn i18n(&self) -> I18n {
        I18n::new(
            self.settings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .locale,
        )
    }

    pub fn store(&self) -> &EmojiStore {
        &self.store
    }

    /// Swap settings and drop both caches (caps change request sizes).
    pub fn reload_settings(&self, next: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.search_cache.clear();
        self.detail_cache.clear();
        info!("settings reloaded, caches cleared");
    }

    fn adapter(&self, source_id: &str) -> Result<&Arc<dyn IconSource>> {
        self.adapters
            .iter()
            .find(|a| a.descriptor().id == source_id)
            .ok_or_else(|| MarketError::UnknownSource(source_id.to_string()))
    }

    fn fetch_ctx(&self, source_id: &str) -> FetchContext {
        let s = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        FetchContext {
            max_results: s.max_per_source(source_id),
            i18n: I18n::new(s.locale),
        }
    }

    /// Enabled sources that have an adapter, in display order.
    pub fn enabled_sources(&self) -> Vec<&'static Source> {
        let s = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        self.adapters
            .iter()
            .map(|a| a.descriptor())
            .filter(|d| s.is_enabled(d.id))
            .collect()
    }

    pub fn descriptors(&self) -> Vec<&'static Source> {
        self.adapters.iter().map(|a| a.descriptor()).collect()
    }

    async fn search_one(&self, source_id: &str, keyword: &str) -> Result<Arc<Vec<IconSummary>>> {
        let adapter = self.adapter(source_id)?;
        let key = cache::search_key(source_id, keyword);
        if let Some(hit) = self.search_cache.get(&key) {
            return Ok(hit);
        }
        let ctx = self.fetch_ctx(source_id);
        // Same form as the cache key, so one key never maps to two upstream queries.
        let query = collapse_ws(keyword).to_lowercase();
        let items = Arc::new(adapter.search(&query, &ctx).await?);
        debug!(target: "adapter", source = source_id, count = items.len(), "search settled");
        self.search_cache.set(key, items.clone());
        Ok(items)
    }

    /// Concurrent search over `source_ids`; waits for every source to settle.
    pub async fn search_all(&self, keyword: &str, source_ids: &[&str]) -> SearchResults {
        if keyword.trim().is_empty() {
            return source_ids
                .iter()
                .map(|id| (id.to_string(), SourceOutcome::ok(Arc::new(Vec::new()))))
                .collect();
        }
        let settled = join_all(source_ids.iter().map(|id| async move {
            let outcome = match self.search_one(id, keyword).await {
                Ok(items) => SourceOutcome::ok(items),
                Err(e) => {
                    warn!(target: "adapter", source = %id, error = %e, "source search failed");
                    counter!("icon_source_errors_total", "source" => id.to_string()).increment(1);
                    SourceOutcome::failed(e)
                }
            };
            (id.to_string(), outcome)
        }))
        .await;
        settled.into_iter().collect()
    }

    pub async fn search_enabled(&self, keyword: &str) -> SearchResults {
        let ids: Vec<&str> = self.enabled_sources().iter().map(|s| s.id).collect();
        self.search_all(keyword, &ids).await
    }

    /// Detail for one hit, served from the detail cache when fresh.
    pub async fn get_detail(&self, source_id: &str, summary: &IconSummary) -> Result<Arc<IconDetail>> {
        let adapter = self.adapter(source_id)?;
        let key = cache::detail_key(source_id, summary);
        if let Some(hit) = self.detail_cache.get(&key) {
            return Ok(hit);
        }
        let ctx = self.fetch_ctx(source_id);
        let detail = Arc::new(adapter.detail(summary, &ctx).await?);
        self.detail_cache.set(key, detail.clone());
        Ok(detail)
    }

    /// Markup the dialog previews, with the color menu next to it.
    pub async fn preview(
        &self,
        source_id: &str,
        summary: &IconSummary,
        decision: &ImportDecision,
    ) -> Result<PreviewView> {
        let detail = self.get_detail(source_id, summary).await?;
        let i18n = self.i18n();
        let base = base_markup(&detail, summary)
            .ok_or_else(|| MarketError::Validation(i18n.t("errorNoSvg", &[])))?;
        let colored = match decision.color_to_apply() {
            Some(c) => svg::apply_color(base, c),
            None => base.to_string(),
        };
        let svg = svg::fit_preview(&colored)
            .ok_or_else(|| MarketError::Validation(i18n.t("previewUnavailable", &[])))?;
        Ok(PreviewView {
            svg,
            palette: build_palette(&detail.default_color, &detail.palette_colors),
            default_color: detail.default_color.clone(),
        })
    }

    /// Recolor, sanitize and persist one icon. An unconfirmed decision is a
    /// no-op and yields `None`.
    pub async fn import_icon(
        &self,
        source_id: &str,
        summary: &IconSummary,
        decision: &ImportDecision,
    ) -> Result<Option<PersistedIcon>> {
        if !decision.confirmed {
            debug!(source = source_id, id = %summary.id, "import dismissed");
            return Ok(None);
        }
        let source = self.adapter(source_id)?.descriptor();
        let detail = self.get_detail(source_id, summary).await?;
        let i18n = self.i18n();

        let raw = base_markup(&detail, summary)
            .ok_or_else(|| MarketError::Validation(i18n.t("errorNoSvg", &[])))?;
        let colored = match decision.color_to_apply() {
            Some(c) => svg::apply_color(raw, c),
            None => raw.to_string(),
        };
        let clean = svg::sanitize(&colored);
        if clean.is_empty() {
            return Err(MarketError::Validation(i18n.t("errorInvalidSvg", &[])));
        }

        let base = file_base_name(source, summary, &detail, self.clock.now_ms());
        let file_name = format!("{base}.svg");
        let root = self
            .store
            .write(source, &file_name, clean.as_bytes(), SVG_MIME)
            .await
            .map_err(|e| MarketError::Persistence {
                source_id: source.id.to_string(),
                message: format!("{}: {e}", i18n.t("errorWriteFile", &[])),
            })?;

        let legacy = storage::join_path(
            &root,
            &format!("{}/{base}{}", source.dir, storage::LEGACY_META_SUFFIX),
        );
        self.store.remove_best_effort(&legacy).await;

        counter!("icon_imports_total", "source" => source.id).increment(1);
        info!(source = source.id, file = %file_name, root = %root, "icon imported");
        Ok(Some(PersistedIcon {
            path: format!("{}/{file_name}", source.dir),
            file_name,
            root,
            bytes: clean.len(),
        }))
    }

    /// Only absolute `http(s)` URLs are fetched; protocol-relative ones are
    /// read as https.
    pub async fn avatar_data_uri(&self, url: &str) -> Result<String> {
        if url.trim().is_empty() {
            return Err(MarketError::Validation("avatar url missing".into()));
        }
        let parsed = Url::parse(&https_url(url))
            .map_err(|e| MarketError::Validation(format!("avatar url invalid: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(MarketError::Validation(format!(
                "avatar url scheme not allowed: {}",
                parsed.scheme()
            )));
        }
        self.http.fetch_data_uri(parsed.as_str()).await
    }

    pub async fn cleanup_legacy(&self) -> usize {
        self.store.cleanup_legacy_meta_files().await
    }

    /// Localized one-liner for a failure scoped to `source_id`.
    pub fn describe_source_error(&self, source_id: &str, err: &MarketError) -> String {
        let name = sources::find(source_id).map(|s| s.name).unwrap_or(source_id);
        self.i18n()
            .t("sourceSearchFailed", &[("source", name), ("msg", &err.to_string())])
    }
}

fn base_markup<'a>(detail: &'a IconDetail, summary: &'a IconSummary) -> Option<&'a str> {
    [detail.svg.trim(), summary.preview_svg.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
}

/// `<slug>-<id>`, or `emoji-<source>-<id>` when the name slugs to nothing.
/// The id is reduced to `[A-Za-z0-9_-]`; a missing (or fully stripped) id is
/// replaced by `now_ms`.
pub fn file_base_name(source: &Source, summary: &IconSummary, detail: &IconDetail, now_ms: u64) -> String {
    let id = match file_id(&summary.id) {
        id if id.is_empty() => now_ms.to_string(),
        id => id,
    };
    let name = if summary.name.trim().is_empty() {
        detail.title.as_str()
    } else {
        summary.name.as_str()
    };
    match slugify(name) {
        s if s.is_empty() => format!("emoji-{}-{id}", source.id),
        s => format!("{s}-{id}"),
    }
}

/// Result of one keystroke-driven search.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Ready(SearchResults),
    /// A newer search started before this one finished; discard.
    Superseded,
    /// Empty keyword: the panel should be emptied.
    Cleared,
}

/// Debounce plus a monotonically increasing sequence guard for one search box.
#[derive(Debug)]
pub struct SearchSession {
    seq: AtomicU64,
    debounce: Duration,
}

impl SearchSession {
    pub fn new(debounce: Duration) -> Self {
        Self {
            seq: AtomicU64::new(0),
            debounce,
        }
    }

    pub fn current(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn begin(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn search(&self, orch: &Orchestrator, keyword: &str) -> SessionOutcome {
        let ticket = self.begin();
        if keyword.trim().is_empty() {
            return SessionOutcome::Cleared;
        }
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if self.current() != ticket {
            return SessionOutcome::Superseded;
        }
        let results = orch.search_enabled(keyword).await;
        if self.current() != ticket {
            debug!(ticket, latest = self.current(), "stale search result dropped");
            return SessionOutcome::Superseded;
        }
        SessionOutcome::Ready(results)
    }
}

/// Upper bound on live search sessions kept by a [`SessionRegistry`].
pub const MAX_SESSIONS: usize = 256;

#[derive(Debug, Default)]
struct SessionTable {
    entries: HashMap<String, (Arc<SearchSession>, u64)>,
    tick: u64,
}

/// Named sessions, one per client search box. Bounded: once full, the least
/// recently used session is dropped to make room.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<SessionTable>,
    debounce: Duration,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self::with_capacity(debounce, MAX_SESSIONS)
    }

    pub fn with_capacity(debounce: Duration, capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(SessionTable::default()),
            debounce,
            capacity: capacity.max(1),
        }
    }

    pub fn session(&self, id: &str) -> Arc<SearchSession> {
        let mut table = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        table.tick += 1;
        let tick = table.tick;
        if let Some((session, last_used)) = table.entries.get_mut(id) {
            *last_used = tick;
            return session.clone();
        }
        while table.entries.len() >= self.capacity {
            let Some(oldest) = table
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            // An in-flight search keeps its own Arc and finishes normally.
            table.entries.remove(&oldest);
            debug!(session = %oldest, "evicted least recently used search session");
        }
        let session = Arc::new(SearchSession::new(self.debounce));
        table.entries.insert(id.to_string(), (session.clone(), tick));
        session
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
