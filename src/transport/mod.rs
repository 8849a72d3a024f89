// src/transport/mod.rs
//! Outbound HTTP through an ordered fallback chain.
//!
//! Each [`Transport`] is one delivery mechanism; [`FallbackChain`] tries them
//! in priority order and returns the first success or the last failure.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use crate::error::{MarketError, Result, TransportError};

pub mod avatar;
pub mod direct;
pub mod forward_proxy;
pub mod raw_socket;

pub use direct::DirectTransport;
pub use forward_proxy::{ForwardProxyTransport, HostEndpoint};
pub use raw_socket::RawSocketTransport;

/// Default browser-ish user agent sent by every mechanism.
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Method, headers and body of one logical request.
///
/// Header names keep their original spelling but lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn get() -> Self {
        Self {
            method: "GET".into(),
            ..Self::default()
        }
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_value(name).is_some()
    }

    /// Upper-cased method, `GET` when unset.
    pub fn method(&self) -> String {
        let m = self.method.trim();
        if m.is_empty() {
            "GET".into()
        } else {
            m.to_ascii_uppercase()
        }
    }
}

/// Raw response body plus its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One delivery mechanism. Any HTTP status >= 400 is a failure.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_text(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> std::result::Result<String, TransportError>;

    async fn fetch_binary(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> std::result::Result<BinaryBody, TransportError>;
}

/// What adapters see: text, JSON and avatar data-URI fetching.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch_text(&self, url: &str, req: &RequestSpec, origin_hint: &str) -> Result<String>;

    async fn fetch_json(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> Result<serde_json::Value> {
        let text = self.fetch_text(url, req, origin_hint).await?;
        serde_json::from_str(&text).map_err(|e| MarketError::Parse(format!("invalid JSON: {e}")))
    }

    /// Fetch an image and return it as `data:<type>;base64,<payload>`.
    async fn fetch_data_uri(&self, _url: &str) -> Result<String> {
        Err(TransportError::Unavailable("binary fetch not supported".into()).into())
    }
}

/// Ordered list of mechanisms; first success wins.
#[derive(Clone)]
pub struct FallbackChain {
    transports: Vec<Arc<dyn Transport>>,
}

impl FallbackChain {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { transports }
    }

    /// Direct request, then the host forward proxy, then the raw socket client.
    pub fn standard(host: HostEndpoint) -> Self {
        Self::new(vec![
            Arc::new(DirectTransport::new()),
            Arc::new(ForwardProxyTransport::new(host)),
            Arc::new(RawSocketTransport::new()),
        ])
    }

    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    pub(crate) fn note_failure(transport: &dyn Transport, url: &str, err: &TransportError) {
        debug!(target: "transport", transport = transport.name(), url, error = %err, "transport failed, falling back");
        counter!("icon_transport_fallbacks_total", "transport" => transport.name()).increment(1);
    }
}

#[async_trait]
impl HttpFetch for FallbackChain {
    async fn fetch_text(&self, url: &str, req: &RequestSpec, origin_hint: &str) -> Result<String> {
        let mut last = TransportError::Unavailable("no transport configured".into());
        for t in &self.transports {
            match t.fetch_text(url, req, origin_hint).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    Self::note_failure(t.as_ref(), url, &e);
                    last = e;
                }
            }
        }
        Err(last.into())
    }

    async fn fetch_data_uri(&self, url: &str) -> Result<String> {
        avatar::fetch_data_uri(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        outcome: std::result::Result<&'static str, TransportError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn fetch_text(
            &self,
            _url: &str,
            _req: &RequestSpec,
            _origin: &str,
        ) -> std::result::Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map(str::to_string)
        }
        async fn fetch_binary(
            &self,
            _url: &str,
            _req: &RequestSpec,
            _origin: &str,
        ) -> std::result::Result<BinaryBody, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map(|s| BinaryBody {
                content_type: "image/png".into(),
                bytes: s.as_bytes().to_vec(),
            })
        }
    }

    fn scripted(
        name: &'static str,
        outcome: std::result::Result<&'static str, TransportError>,
    ) -> Arc<Scripted> {
        Arc::new(Scripted {
            name,
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let a = scripted("a", Err(TransportError::Status(500)));
        let b = scripted("b", Ok("hello"));
        let c = scripted("c", Ok("never"));
        let chain = FallbackChain::new(vec![a.clone(), b.clone(), c.clone()]);
        let got = chain.fetch_text("https://x", &RequestSpec::get(), "").await;
        assert_eq!(got.unwrap(), "hello");
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failing_reports_last_error() {
        let chain = FallbackChain::new(vec![
            scripted("a", Err(TransportError::Status(500))),
            scripted("b", Err(TransportError::Timeout)),
            scripted("c", Err(TransportError::TooManyRedirects)),
        ]);
        let err = chain
            .fetch_text("https://x", &RequestSpec::get(), "")
            .await
            .unwrap_err();
        assert_eq!(err, MarketError::Transport(TransportError::TooManyRedirects));
    }

    #[tokio::test]
    async fn fetch_json_rejects_garbage() {
        let chain = FallbackChain::new(vec![scripted("a", Ok("<html>"))]);
        let err = chain
            .fetch_json("https://x", &RequestSpec::get(), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = RequestSpec::get()
            .header("Content-Type", "text/plain")
            .header("content-type", "application/json");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header_value("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(RequestSpec::default().method(), "GET");
    }
}
