// src/transport/forward_proxy.rs
//! Indirect requests through the host's authenticated forward proxy.
//!
//! The host replays method/headers/body against the target and answers with an
//! envelope `{code, msg, data: {status, body, contentType}}`. Field names are
//! matched in both camel and Pascal case.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{BinaryBody, RequestSpec, Transport};
use crate::error::TransportError;

/// Timeout the proxy enforces on the forwarded call, and on our call to it.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(15);

/// Host application base URL plus the token it already issued us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostEndpoint {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token: String,
}

impl HostEndpoint {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }

    /// `Authorization: Token <token>` when a token is present.
    pub fn auth_header(&self) -> Option<String> {
        let t = self.token.trim();
        (!t.is_empty()).then(|| format!("Token {t}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

pub struct ForwardProxyTransport {
    host: HostEndpoint,
    client: Client,
}

impl ForwardProxyTransport {
    pub fn new(host: HostEndpoint) -> Self {
        let client = Client::builder()
            .timeout(PROXY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { host, client }
    }

    /// Forward one request; `response_encoding` is `text` or `base64`.
    pub async fn request(
        &self,
        url: &str,
        req: &RequestSpec,
        response_encoding: &str,
    ) -> Result<ProxyResponse, TransportError> {
        if !self.host.is_configured() {
            return Err(TransportError::Unavailable("no host base url configured".into()));
        }
        let payload = build_payload(url, req, response_encoding);

        let mut builder = self
            .client
            .post(self.host.url("/api/network/forwardProxy"))
            .json(&payload);
        if let Some(auth) = self.host.auth_header() {
            builder = builder.header("Authorization", auth);
        }
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Proxy(e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        let envelope: Option<Value> = resp.json().await.ok();
        if status >= 400 {
            return Err(TransportError::Status(status));
        }
        parse_envelope(envelope.unwrap_or(Value::Null))
    }
}

pub(crate) fn build_payload(url: &str, req: &RequestSpec, response_encoding: &str) -> Value {
    let headers: serde_json::Map<String, Value> = req
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let content_type = req
        .header_value("content-type")
        .unwrap_or("application/json")
        .to_string();
    json!({
        "url": url,
        "method": req.method(),
        "timeout": PROXY_TIMEOUT.as_millis() as u64,
        "contentType": content_type,
        "headers": if headers.is_empty() { json!([]) } else { json!([headers]) },
        "payload": req.body.clone().unwrap_or_default(),
        "payloadEncoding": "text",
        "responseEncoding": response_encoding,
    })
}

fn field<'a>(v: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| v.get(*n).filter(|x| !x.is_null()))
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Unwrap the proxy envelope, classifying every failure mode.
pub fn parse_envelope(envelope: Value) -> Result<ProxyResponse, TransportError> {
    let code = field(&envelope, &["code", "Code"]).and_then(as_i64).unwrap_or(-1);
    if code != 0 {
        let message = field(&envelope, &["msg", "Msg"])
            .map(as_text)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("forwardProxy error ({code})"));
        return Err(TransportError::ProxyEnvelope { code, message });
    }
    let data = field(&envelope, &["data", "Data"]).cloned().unwrap_or(Value::Null);
    let status = field(&data, &["status", "StatusCode", "statusCode"])
        .and_then(as_i64)
        .unwrap_or(0);
    if status <= 0 {
        return Err(TransportError::Proxy("invalid forwardProxy status".into()));
    }
    if status >= 400 {
        return Err(TransportError::Status(status.min(u16::MAX as i64) as u16));
    }
    Ok(ProxyResponse {
        status: status as u16,
        body: field(&data, &["body", "Body"]).map(as_text).unwrap_or_default(),
        content_type: field(&data, &["contentType", "ContentType"])
            .map(as_text)
            .unwrap_or_default(),
    })
}

#[async_trait]
impl Transport for ForwardProxyTransport {
    fn name(&self) -> &'static str {
        "forward_proxy"
    }

    async fn fetch_text(
        &self,
        url: &str,
        req: &RequestSpec,
        _origin_hint: &str,
    ) -> Result<String, TransportError> {
        Ok(self.request(url, req, "text").await?.body)
    }

    async fn fetch_binary(
        &self,
        url: &str,
        req: &RequestSpec,
        _origin_hint: &str,
    ) -> Result<BinaryBody, TransportError> {
        let resp = self.request(url, req, "base64").await?;
        if resp.body.trim().is_empty() {
            return Err(TransportError::Proxy("empty body".into()));
        }
        let bytes = STANDARD
            .decode(resp.body.trim())
            .map_err(|e| TransportError::Proxy(format!("invalid base64 body: {e}")))?;
        Ok(BinaryBody {
            content_type: resp.content_type,
            bytes,
        })
    }
}
