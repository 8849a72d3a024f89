// src/transport/direct.rs
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};

use super::{BinaryBody, RequestSpec, Transport};
use crate::error::TransportError;

/// In-process request through a shared reqwest client (follows redirects itself).
pub struct DirectTransport {
    client: Client,
}

impl DirectTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str, req: &RequestSpec) -> Result<reqwest::Response, TransportError> {
        let method = Method::from_bytes(req.method().as_bytes())
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let mut builder = self.client.request(method, url);
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await.map_err(map_reqwest)?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(resp)
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else if e.is_redirect() {
        TransportError::TooManyRedirects
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch_text(
        &self,
        url: &str,
        req: &RequestSpec,
        _origin_hint: &str,
    ) -> Result<String, TransportError> {
        let resp = self.send(url, req).await?;
        resp.text().await.map_err(map_reqwest)
    }

    async fn fetch_binary(
        &self,
        url: &str,
        req: &RequestSpec,
        _origin_hint: &str,
    ) -> Result<BinaryBody, TransportError> {
        let resp = self.send(url, req).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp.bytes().await.map_err(map_reqwest)?;
        Ok(BinaryBody {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
