// tests/common/mod.rs
//
// Shared stubs for integration tests: scripted icon sources, a routed
// HttpFetch that serves fixture files, and orchestrator builders.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use icon_market::adapters::{FetchContext, IconSource};
use icon_market::cache::{Clock, ManualClock};
use icon_market::error::{MarketError, Result, TransportError};
use icon_market::models::{IconDetail, IconSummary};
use icon_market::settings::Settings;
use icon_market::sources::Source;
use icon_market::storage::{EmojiStore, FsStore};
use icon_market::transport::{HttpFetch, RequestSpec};
use icon_market::Orchestrator;

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

pub fn summary(provider: &str, id: &str, name: &str) -> IconSummary {
    IconSummary {
        provider: provider.into(),
        id: id.into(),
        name: name.into(),
        preview_svg: format!(r#"<svg viewBox="0 0 24 24"><path d="M0 0h{id}"/></svg>"#),
        detail_url: format!("https://example.test/detail/{id}"),
    }
}

/// Icon source with canned answers that counts its calls.
pub struct StubSource {
    pub desc: &'static Source,
    pub items: std::result::Result<Vec<IconSummary>, MarketError>,
    pub detail: IconDetail,
    pub search_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub keywords: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn with_items(desc: &'static Source, n: usize) -> Self {
        let items = (1..=n)
            .map(|i| summary(desc.id, &i.to_string(), &format!("{} icon {i}", desc.id)))
            .collect();
        Self {
            desc,
            items: Ok(items),
            detail: IconDetail::default(),
            search_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            keywords: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(desc: &'static Source, err: MarketError) -> Self {
        Self {
            items: Err(err),
            ..Self::with_items(desc, 0)
        }
    }

    pub fn with_detail(mut self, detail: IconDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.keywords.lock().unwrap().clone()
    }

    pub fn details(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IconSource for StubSource {
    fn descriptor(&self) -> &'static Source {
        self.desc
    }

    async fn search(&self, keyword: &str, _ctx: &FetchContext) -> Result<Vec<IconSummary>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.keywords.lock().unwrap().push(keyword.to_string());
        self.items.clone()
    }

    async fn detail(&self, _summary: &IconSummary, _ctx: &FetchContext) -> Result<IconDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detail.clone())
    }
}

/// Serves canned bodies by URL prefix and records requested URLs.
#[derive(Default)]
pub struct RoutedHttp {
    routes: Vec<(String, String)>,
    pub seen: Mutex<Vec<(String, RequestSpec)>>,
}

impl RoutedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, body: String) -> Self {
        self.routes.push((prefix.to_string(), body));
        self
    }

    pub fn requests(&self) -> Vec<(String, RequestSpec)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetch for RoutedHttp {
    async fn fetch_text(&self, url: &str, req: &RequestSpec, _origin_hint: &str) -> Result<String> {
        self.seen.lock().unwrap().push((url.to_string(), req.clone()));
        self.routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| TransportError::Status(404).into())
    }
}

pub fn fs_store(root: &Path) -> EmojiStore {
    EmojiStore::for_fs(Arc::new(FsStore::new(root)))
}

pub fn orchestrator(
    adapters: Vec<Arc<dyn IconSource>>,
    store: EmojiStore,
    clock: Arc<ManualClock>,
) -> Orchestrator {
    let clock: Arc<dyn Clock> = clock;
    Orchestrator::new(
        Settings::default(),
        adapters,
        Arc::new(RoutedHttp::new()),
        store,
        clock,
    )
}
