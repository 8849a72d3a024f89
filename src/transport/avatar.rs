// src/transport/avatar.rs
//! Avatar images resolved to embeddable `data:` URIs.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{BinaryBody, FallbackChain, RequestSpec, USER_AGENT};
use crate::error::{Result, TransportError};
use crate::sources::ICONFONT;

const DEFAULT_IMAGE_TYPE: &str = "image/png";

fn avatar_request(with_origin: bool) -> RequestSpec {
    let req = RequestSpec::get()
        .header("User-Agent", USER_AGENT)
        .header("Referer", format!("{}/", ICONFONT.origin))
        .header("Accept", "image/*,*/*");
    if with_origin {
        req.header("Origin", ICONFONT.origin)
    } else {
        req
    }
}

/// `data:<type>;base64,<payload>`; parameters after `;` in the type are dropped.
pub fn to_data_uri(body: &BinaryBody) -> std::result::Result<String, TransportError> {
    if body.bytes.is_empty() {
        return Err(TransportError::Request("empty avatar body".into()));
    }
    let ct = body
        .content_type
        .split(';')
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_IMAGE_TYPE);
    Ok(format!("data:{ct};base64,{}", STANDARD.encode(&body.bytes)))
}

/// Same ordered fallback as text fetching, but over binary bodies.
pub async fn fetch_data_uri(chain: &FallbackChain, url: &str) -> Result<String> {
    let mut last = TransportError::Unavailable("no transport configured".into());
    for t in chain.transports() {
        let req = avatar_request(t.name() == "forward_proxy");
        let attempt = match t.fetch_binary(url, &req, ICONFONT.origin).await {
            Ok(body) => to_data_uri(&body),
            Err(e) => Err(e),
        };
        match attempt {
            Ok(uri) => return Ok(uri),
            Err(e) => {
                FallbackChain::note_failure(t.as_ref(), url, &e);
                last = e;
            }
        }
    }
    Err(last.into())
}
