// src/adapters/iconfont.rs
//! JSON-API adapter for iconfont.cn.
//!
//! Search is a form POST whose envelope must carry `code == 200`. Icon rows
//! embed their artwork in one of three shapes (pre-rendered preview, origin
//! file, or raw path data) and rows without any usable markup are skipped.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{first_non_empty, json_int, json_raw, json_text, FetchContext, IconSource};
use crate::color::{extract_colors, FALLBACK_COLOR};
use crate::error::{MarketError, Result};
use crate::i18n::I18n;
use crate::models::{IconDetail, IconSummary};
use crate::sources::{Source, ICONFONT, ICONFONT_COPYRIGHT_TERMS_URL};
use crate::text::{clean_title, format_date, https_url, to_abs};
use crate::transport::{HttpFetch, RequestSpec, USER_AGENT};

const SUCCESS_CODE: i64 = 200;
const DEFAULT_VIEWPORT: i64 = 1024;

pub struct IconfontSource {
    http: Arc<dyn HttpFetch>,
}

impl IconfontSource {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }
}

fn enc(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Search endpoint URL; `count` is twice the display cap.
pub fn search_url(keyword: &str, max_results: u32) -> String {
    format!(
        "{}/api/icon/search.json?q={}&page=1&count={}&sortType=updated_at&fromCollection=1",
        ICONFONT.origin,
        enc(keyword),
        max_results.saturating_mul(2)
    )
}

fn ensure_success(json: &Value, fallback: &str) -> Result<()> {
    let code = json_int(json.get("code"), -1);
    if code == SUCCESS_CODE {
        return Ok(());
    }
    let message = json_text(json.get("message"));
    Err(MarketError::upstream(
        ICONFONT.id,
        if message.is_empty() {
            fallback.to_string()
        } else {
            message
        },
    ))
}

/// Inline SVG for a row: `origin_file`, then `show_svg`, then assembled from
/// `svg` path data split on `|` with matching `path_attributes`.
pub fn build_svg(row: &Value) -> String {
    let origin = json_raw(row.get("origin_file"));
    if !origin.is_empty() {
        return origin;
    }
    let show = json_raw(row.get("show_svg"));
    if !show.is_empty() {
        return show;
    }
    let raw = json_raw(row.get("svg"));
    if raw.is_empty() {
        return String::new();
    }

    let dim = |key: &str| match json_int(row.get(key), DEFAULT_VIEWPORT) {
        0 => DEFAULT_VIEWPORT,
        n => n,
    };
    let (width, height) = (dim("width"), dim("height"));

    let paths: Vec<&str> = raw.split('|').map(str::trim).filter(|p| !p.is_empty()).collect();
    if paths.is_empty() {
        return String::new();
    }
    let attrs_raw = json_raw(row.get("path_attributes"));
    let attrs: Vec<&str> = attrs_raw.split('|').map(str::trim).collect();

    let body: String = paths
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let extra = attrs
                .get(i)
                .filter(|a| !a.is_empty())
                .map(|a| format!(" {a}"))
                .unwrap_or_default();
            format!(
                "<path d=\"{}\"{extra} />",
                html_escape::encode_double_quoted_attribute(d)
            )
        })
        .collect();

    format!(
        "<svg viewBox=\"0 0 {width} {height}\" xmlns=\"http://www.w3.org/2000/svg\">{body}</svg>"
    )
}

/// Map a search envelope to summaries.
pub fn parse_search(json: &Value) -> Result<Vec<IconSummary>> {
    ensure_success(json, "iconfont search error")?;
    let rows = json
        .pointer("/data/icons")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = json_text(row.get("id"));
        if id.is_empty() || seen.contains(&id) {
            continue;
        }
        let mut preview_svg = json_raw(row.get("show_svg"));
        if preview_svg.is_empty() {
            preview_svg = build_svg(row);
        }
        if preview_svg.is_empty() {
            debug!(target: "adapter", source = ICONFONT.id, id = %id, "row without usable markup skipped");
            continue;
        }
        let name = first_non_empty([
            json_text(row.get("name")),
            json_text(row.get("slug")),
            json_text(row.get("font_class")),
            format!("icon-{id}"),
        ]);
        items.push(IconSummary {
            provider: ICONFONT.id.to_string(),
            detail_url: format!("{}/icons/detail?icon_id={}", ICONFONT.origin, enc(&id)),
            id: id.clone(),
            name,
            preview_svg,
        });
        seen.insert(id);
    }
    Ok(items)
}

/// Map a detail envelope to the normalized record.
pub fn parse_detail(json: &Value, summary: &IconSummary, i18n: &I18n) -> Result<IconDetail> {
    ensure_success(json, "iconfont detail error")?;
    let id = summary.id.trim();
    let null = Value::Null;
    let d = json.get("data").unwrap_or(&null);
    let collection = d
        .get("collections")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .unwrap_or(&null);

    let creator = d
        .get("creater")
        .filter(|c| c.is_object())
        .or_else(|| d.get("creator").filter(|c| c.is_object()))
        .unwrap_or(&null);
    let uid = first_non_empty([json_text(creator.get("id")), json_text(d.get("user_id"))]);
    let nid = json_text(creator.get("nid"));
    let author_url = if uid.is_empty() {
        String::new()
    } else if nid.is_empty() {
        format!("{}/user/detail?uid={}", ICONFONT.origin, enc(&uid))
    } else {
        format!(
            "{}/user/detail?uid={}&nid={}",
            ICONFONT.origin,
            enc(&uid),
            enc(&nid)
        )
    };
    let avatar_raw = first_non_empty([json_raw(creator.get("avatar")), json_raw(d.get("avatar"))]);
    let avatar_url = to_abs(ICONFONT.origin, &https_url(&avatar_raw));

    let fees = json_text(collection.get("fees"));
    let copyright_type = json_text(collection.get("copyright"));
    let collection_license = json_text(collection.get("license"));
    let collection_id = json_text(collection.get("id"));
    let collection_url = if collection_id.is_empty() {
        String::new()
    } else {
        format!("{}/collections/detail?cid={}", ICONFONT.origin, enc(&collection_id))
    };

    let path_attributes = json_raw(d.get("path_attributes"));
    let show_svg = json_raw(d.get("show_svg"));
    let origin_file = json_raw(d.get("origin_file"));
    let palette = extract_colors(&[&path_attributes, &show_svg, &origin_file]);

    let svg = first_non_empty([
        origin_file.clone(),
        show_svg.clone(),
        build_svg(d),
        summary.preview_svg.trim().to_string(),
    ]);

    let license = if !collection_license.is_empty() {
        collection_license
    } else {
        match copyright_type.as_str() {
            "opensource" => i18n.label("licenseOpenSource"),
            "original" => i18n.label("licenseOriginal"),
            _ => i18n.label("unlabeled"),
        }
    };

    let tags = json_text(d.get("slug"))
        .split(|c: char| c == '\u{FF0C}' || c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    Ok(IconDetail {
        title: clean_title(&first_non_empty([
            json_text(d.get("name")),
            summary.name.clone(),
            i18n.label("unnamed"),
        ])),
        author: first_non_empty([json_text(creator.get("nickname")), i18n.label("unknownAuthor")]),
        author_url,
        avatar_url,
        updated_at: format_date(&json_text(d.get("updated_at"))),
        license,
        license_url: ICONFONT_COPYRIGHT_TERMS_URL.to_string(),
        usage_lines: Vec::new(),
        usage_link_url: ICONFONT_COPYRIGHT_TERMS_URL.to_string(),
        svg,
        default_color: palette
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_COLOR.to_string()),
        palette_colors: palette,
        detail_url: format!("{}/detail/index?icon_id={}", ICONFONT.origin, enc(id)),
        collection_name: json_text(collection.get("name")),
        collection_url,
        commercial_url: json_raw(collection.get("url")),
        tags,
        favor_count: json_int(d.get("favorCount"), 0),
        copyright_url: ICONFONT_COPYRIGHT_TERMS_URL.to_string(),
        fees,
        copyright_type,
    })
}

#[async_trait]
impl IconSource for IconfontSource {
    fn descriptor(&self) -> &'static Source {
        &ICONFONT
    }

    async fn search(&self, keyword: &str, ctx: &FetchContext) -> Result<Vec<IconSummary>> {
        let referer = format!(
            "{}/search/index?searchType=icon&q={}",
            ICONFONT.origin,
            enc(keyword)
        );
        let req = RequestSpec::post("")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .header("Referer", referer)
            .header("Origin", ICONFONT.origin)
            .header("User-Agent", USER_AGENT)
            .header("X-Requested-With", "XMLHttpRequest");
        let json = self
            .http
            .fetch_json(&search_url(keyword, ctx.max_results), &req, ICONFONT.origin)
            .await?;
        let items = parse_search(&json)?;
        debug!(target: "adapter", source = ICONFONT.id, keyword, count = items.len(), "search parsed");
        Ok(items)
    }

    async fn detail(&self, summary: &IconSummary, ctx: &FetchContext) -> Result<IconDetail> {
        let id = summary.id.trim();
        if id.is_empty() {
            return Err(MarketError::Validation("iconfont id missing".into()));
        }
        let req = RequestSpec::get()
            .header(
                "Referer",
                format!("{}/search/index?searchType=icon", ICONFONT.origin),
            )
            .header("Origin", ICONFONT.origin)
            .header("User-Agent", USER_AGENT)
            .header("X-Requested-With", "XMLHttpRequest");
        let url = format!("{}/api/icon/iconInfo.json?id={}", ICONFONT.origin, enc(id));
        let json = self.http.fetch_json(&url, &req, ICONFONT.origin).await?;
        parse_detail(&json, summary, &ctx.i18n)
    }
}
