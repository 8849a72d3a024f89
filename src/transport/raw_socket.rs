// src/transport/raw_socket.rs
//! Minimal HTTP/1.1 client over a plain TCP socket (rustls for https).
//!
//! Used when neither the in-process client nor the host proxy is usable.
//! Redirects are followed manually and the full body is buffered.

use std::sync::Arc;

use async_trait::async_trait;
use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use url::{Position, Url};

use super::{BinaryBody, RequestSpec, Transport, USER_AGENT};
use crate::error::TransportError;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct RawSocketTransport {
    tls: Option<TlsConnector>,
}

impl RawSocketTransport {
    pub fn new() -> Self {
        let tls = match tls_config() {
            Ok(cfg) => Some(TlsConnector::from(Arc::new(cfg))),
            Err(e) => {
                warn!(target: "transport", error = %e, "raw socket TLS unavailable; https disabled");
                None
            }
        };
        Self { tls }
    }

    /// Perform the request, following up to [`MAX_REDIRECTS`] redirects.
    pub async fn request(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> Result<RawResponse, TransportError> {
        let mut current = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let mut hops = 0usize;
        loop {
            let resp = self.exchange(&current, req, origin_hint).await?;
            if (300..400).contains(&resp.status) {
                if let Some(location) = resp.header("location") {
                    if hops >= MAX_REDIRECTS {
                        return Err(TransportError::TooManyRedirects);
                    }
                    current = current
                        .join(location.trim())
                        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
                    hops += 1;
                    debug!(target: "transport", hop = hops, url = %current, "following redirect");
                    continue;
                }
            }
            if resp.status >= 400 {
                return Err(TransportError::Status(resp.status));
            }
            return Ok(resp);
        }
    }

    async fn exchange(
        &self,
        url: &Url,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> Result<RawResponse, TransportError> {
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl(format!("missing host: {url}")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::InvalidUrl(format!("unknown port: {url}")))?;
        let head = build_request_head(url, req, origin_hint);

        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let raw = match url.scheme() {
            "http" => roundtrip(tcp, &head, req.body.as_deref()).await?,
            "https" => {
                let connector = self
                    .tls
                    .as_ref()
                    .ok_or_else(|| TransportError::Tls("no TLS configuration".into()))?;
                let name = ServerName::try_from(host.as_str())
                    .map(|n| n.to_owned())
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                let stream = connector
                    .connect(name, tcp)
                    .await
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                roundtrip(stream, &head, req.body.as_deref()).await?
            }
            other => return Err(TransportError::InvalidUrl(format!("unsupported scheme {other}"))),
        };
        parse_response(&raw)
    }
}

impl Default for RawSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn tls_config() -> Result<ClientConfig, rustls::Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Ok(
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Request line plus headers, including the defaults the socket client adds.
pub(crate) fn build_request_head(url: &Url, req: &RequestSpec, origin_hint: &str) -> String {
    let path = &url[Position::BeforePath..Position::AfterQuery];
    let path = if path.is_empty() { "/" } else { path };
    let host = match url.port() {
        Some(p) => format!("{}:{p}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    };
    let origin = if origin_hint.trim().is_empty() {
        crate::text::origin_of(url)
    } else {
        origin_hint.trim().trim_end_matches('/').to_string()
    };

    let mut head = format!("{} {path} HTTP/1.1\r\nHost: {host}\r\n", req.method());
    for (k, v) in &req.headers {
        if k.eq_ignore_ascii_case("host")
            || k.eq_ignore_ascii_case("connection")
            || k.eq_ignore_ascii_case("content-length")
        {
            continue;
        }
        head.push_str(&format!("{k}: {v}\r\n"));
    }
    if !req.has_header("user-agent") {
        head.push_str(&format!("User-Agent: {USER_AGENT}\r\n"));
    }
    if !req.has_header("referer") {
        head.push_str(&format!("Referer: {origin}/\r\n"));
    }
    if !req.has_header("origin") {
        head.push_str(&format!("Origin: {origin}\r\n"));
    }
    if let Some(body) = req.body.as_deref().filter(|b| !b.is_empty()) {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("Accept-Encoding: identity\r\nConnection: close\r\n\r\n");
    head
}

async fn roundtrip<S>(mut stream: S, head: &str, body: Option<&str>) -> Result<Vec<u8>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let io = |e: std::io::Error| TransportError::Io(e.to_string());
    stream.write_all(head.as_bytes()).await.map_err(io)?;
    if let Some(b) = body.filter(|b| !b.is_empty()) {
        stream.write_all(b.as_bytes()).await.map_err(io)?;
    }
    stream.flush().await.map_err(io)?;

    let mut buf = Vec::new();
    match stream.read_to_end(&mut buf).await {
        Ok(_) => {}
        // Servers that skip TLS close_notify still delivered the full response.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !buf.is_empty() => {}
        Err(e) => return Err(io(e)),
    }
    Ok(buf)
}

fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

/// Parse a buffered HTTP/1.x response: status line, headers, then a
/// chunked, length-delimited or read-to-EOF body.
pub fn parse_response(raw: &[u8]) -> Result<RawResponse, TransportError> {
    let split = find_subslice(raw, b"\r\n\r\n")
        .ok_or_else(|| TransportError::Io("incomplete response head".into()))?;
    let head = String::from_utf8_lossy(&raw[..split]);
    let rest = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Io(format!("bad status line: {status_line}")))?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let mut resp = RawResponse {
        status,
        headers,
        body: Vec::new(),
    };

    let chunked = resp
        .header("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    resp.body = if chunked {
        dechunk(rest)?
    } else if let Some(len) = resp
        .header("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        rest[..len.min(rest.len())].to_vec()
    } else {
        rest.to_vec()
    };
    Ok(resp)
}

fn dechunk(mut data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    loop {
        let line_end = find_subslice(data, b"\r\n")
            .ok_or_else(|| TransportError::Io("truncated chunk header".into()))?;
        let size_line = String::from_utf8_lossy(&data[..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| TransportError::Io(format!("bad chunk size: {size_hex}")))?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(TransportError::Io("truncated chunk".into()));
        }
        out.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
}

#[async_trait]
impl Transport for RawSocketTransport {
    fn name(&self) -> &'static str {
        "raw_socket"
    }

    async fn fetch_text(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> Result<String, TransportError> {
        let resp = self.request(url, req, origin_hint).await?;
        Ok(String::from_utf8_lossy(&resp.body).into_owned())
    }

    async fn fetch_binary(
        &self,
        url: &str,
        req: &RequestSpec,
        origin_hint: &str,
    ) -> Result<BinaryBody, TransportError> {
        let resp = self.request(url, req, origin_hint).await?;
        Ok(BinaryBody {
            content_type: resp.header("content-type").unwrap_or_default().to_string(),
            bytes: resp.body,
        })
    }
}
