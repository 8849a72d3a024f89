// src/adapters/cainiao.rs
//! HTML-scraping adapter for icon.sucai999.com.
//!
//! The listing and detail pages have no schema. Listing items are found by
//! CSS class; detail metadata is located by the visible label text that
//! precedes it (`作者:`, `协议:`, `使用许可`), which is the only stable anchor.
//! Parsing is synchronous because `scraper::Html` is not `Send`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{first_non_empty, FetchContext, IconSource};
use crate::color::{extract_colors, parse_css_color, FALLBACK_COLOR};
use crate::error::Result;
use crate::i18n::I18n;
use crate::models::{IconDetail, IconSummary};
use crate::sources::{Source, CAINIAO};
use crate::text::{clean_title, collapse_ws, to_abs};
use crate::transport::{HttpFetch, RequestSpec, USER_AGENT};

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static ITEM: Lazy<Selector> = Lazy::new(|| sel(".icon-item"));
static ITEM_SVG: Lazy<Selector> = Lazy::new(|| sel(".icon-content svg"));
static DETAIL_ANCHOR: Lazy<Selector> = Lazy::new(|| sel(r#"a[href^="/detail/"]"#));
static P: Lazy<Selector> = Lazy::new(|| sel("p"));
static MAIN: Lazy<Selector> = Lazy::new(|| sel(".main-detail"));
static BODY: Lazy<Selector> = Lazy::new(|| sel("body"));
static SPAN: Lazy<Selector> = Lazy::new(|| sel("span"));
static A_HREF: Lazy<Selector> = Lazy::new(|| sel("a[href]"));
static USAGE_LINE: Lazy<Selector> = Lazy::new(|| sel("p.mt-1.text-gray-400"));
static P_OR_LI: Lazy<Selector> = Lazy::new(|| sel("p, li"));
static SVG_BY_ID: Lazy<Selector> = Lazy::new(|| sel("#svg"));
static SVG_IN_BOX: Lazy<Selector> = Lazy::new(|| sel(".svg-box svg"));
static SVG_ANY: Lazy<Selector> = Lazy::new(|| sel("svg"));
static H1: Lazy<Selector> = Lazy::new(|| sel("h1"));
static COLOR_BUTTON: Lazy<Selector> = Lazy::new(|| sel(".color-button"));

static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^作者[:：]\s*").expect("author regex"));
static RE_LICENSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^协议[:：]\s*").expect("license regex"));
static RE_SPEC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(大小|宽度|颜色)[:：]").expect("size line regex"));
static RE_USAGE_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(商用使用范围|修改与衍生|归属权|使用许可)").expect("usage regex"));
static RE_BG_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)background-color\s*:\s*([^;]+)").expect("bg regex"));

pub struct CainiaoSource {
    http: Arc<dyn HttpFetch>,
}

impl CainiaoSource {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    fn page_request() -> RequestSpec {
        RequestSpec::get()
            .header("Referer", format!("{}/", CAINIAO.origin))
            .header("Origin", CAINIAO.origin)
            .header("User-Agent", USER_AGENT)
    }
}

pub fn search_url(keyword: &str) -> String {
    format!(
        "{}/s-{}-1.html",
        CAINIAO.origin,
        urlencoding::encode(keyword)
    )
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// Extract one summary per `.icon-item` that has both an id and inline SVG.
pub fn parse_search_page(html: &str) -> Vec<IconSummary> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for item in doc.select(&ITEM) {
        let id = collapse_ws(item.value().attr("data-id").unwrap_or_default());
        if id.is_empty() || seen.contains(&id) {
            continue;
        }
        let Some(svg) = item.select(&ITEM_SVG).next() else {
            continue;
        };
        let preview_svg = svg.html().trim().to_string();
        if preview_svg.is_empty() {
            continue;
        }

        let anchor = item.select(&DETAIL_ANCHOR).next();
        let raw_path = anchor
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("/detail/{id}.html"));
        let detail_path = if raw_path.starts_with('/') {
            raw_path
        } else {
            format!("/{raw_path}")
        };

        let name = first_non_empty([
            anchor.map(text_of).unwrap_or_default(),
            item.select(&P).next().map(text_of).unwrap_or_default(),
            format!("icon-{id}"),
        ]);

        items.push(IconSummary {
            provider: CAINIAO.id.to_string(),
            id: id.clone(),
            name,
            preview_svg,
            detail_url: to_abs(CAINIAO.origin, &detail_path),
        });
        seen.insert(id);
    }
    items
}

fn href_abs(el: Option<ElementRef<'_>>) -> String {
    el.and_then(|a| a.value().attr("href"))
        .map(|h| to_abs(CAINIAO.origin, h))
        .unwrap_or_default()
}

/// Map a detail page to the normalized record.
pub fn parse_detail_page(
    html: &str,
    summary: &IconSummary,
    detail_url: &str,
    i18n: &I18n,
) -> IconDetail {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&MAIN)
        .next()
        .or_else(|| doc.select(&BODY).next())
        .unwrap_or_else(|| doc.root_element());

    let spans: Vec<ElementRef<'_>> = root.select(&SPAN).collect();
    let author_span = spans.iter().copied().find(|s| RE_AUTHOR.is_match(&text_of(*s)));
    let license_span = spans.iter().copied().find(|s| RE_LICENSE.is_match(&text_of(*s)));
    let author_link = author_span.and_then(|s| s.select(&A_HREF).next());
    let license_link = license_span.and_then(|s| s.select(&A_HREF).next());

    let author = first_non_empty([
        author_link.map(text_of).unwrap_or_default(),
        author_span
            .map(|s| collapse_ws(&RE_AUTHOR.replace(&text_of(s), "")))
            .unwrap_or_default(),
        i18n.label("unknownAuthor"),
    ]);
    let license = first_non_empty([
        license_link.map(text_of).unwrap_or_default(),
        license_span
            .map(|s| collapse_ws(&RE_LICENSE.replace(&text_of(s), "")))
            .unwrap_or_default(),
        i18n.label("unlabeled"),
    ]);

    let mut usage_lines: Vec<String> = Vec::new();
    let mut usage_link_url = String::new();

    let usage_container = root
        .select(&P)
        .find(|p| text_of(*p).starts_with("使用许可"))
        .and_then(|p| p.parent())
        .and_then(ElementRef::wrap);
    if let Some(container) = usage_container {
        for p in container.select(&USAGE_LINE) {
            let line = text_of(p);
            if !line.is_empty() && !RE_SPEC_LINE.is_match(&line) {
                usage_lines.push(line);
            }
        }
        usage_link_url = href_abs(container.select(&A_HREF).next());
    }
    if usage_lines.is_empty() {
        for node in root.select(&P_OR_LI) {
            let line = text_of(node);
            if !line.is_empty() && !RE_SPEC_LINE.is_match(&line) && RE_USAGE_HINT.is_match(&line)
            {
                usage_lines.push(line);
            }
        }
    }
    let mut seen = HashSet::new();
    usage_lines.retain(|l| seen.insert(l.clone()));

    if usage_link_url.is_empty() {
        let fallback = root.select(&A_HREF).find(|a| {
            let href = a.value().attr("href").unwrap_or_default().to_ascii_lowercase();
            href.contains("license") || href.contains("xieyi") || href.contains("protocol")
        });
        usage_link_url = href_abs(fallback);
    }

    let svg = root
        .select(&SVG_BY_ID)
        .next()
        .or_else(|| root.select(&SVG_IN_BOX).next())
        .or_else(|| root.select(&SVG_ANY).next())
        .map(|el| el.html().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| summary.preview_svg.trim().to_string());

    let default_color = root
        .select(&COLOR_BUTTON)
        .next()
        .and_then(|b| b.value().attr("style"))
        .and_then(|style| RE_BG_COLOR.captures(style))
        .and_then(|c| parse_css_color(&collapse_ws(&c[1])))
        .unwrap_or_else(|| FALLBACK_COLOR.to_string());

    IconDetail {
        title: clean_title(&first_non_empty([
            root.select(&H1).next().map(text_of).unwrap_or_default(),
            summary.name.trim().to_string(),
            i18n.label("unnamed"),
        ])),
        author,
        author_url: href_abs(author_link),
        avatar_url: String::new(),
        updated_at: String::new(),
        license,
        license_url: href_abs(license_link),
        usage_lines,
        usage_link_url,
        palette_colors: extract_colors(&[&svg]),
        svg,
        default_color,
        detail_url: detail_url.to_string(),
        ..IconDetail::default()
    }
}

#[async_trait]
impl IconSource for CainiaoSource {
    fn descriptor(&self) -> &'static Source {
        &CAINIAO
    }

    async fn search(&self, keyword: &str, _ctx: &FetchContext) -> Result<Vec<IconSummary>> {
        let html = self
            .http
            .fetch_text(&search_url(keyword), &Self::page_request(), CAINIAO.origin)
            .await?;
        let items = parse_search_page(&html);
        debug!(target: "adapter", source = CAINIAO.id, keyword, count = items.len(), "search parsed");
        Ok(items)
    }

    async fn detail(&self, summary: &IconSummary, ctx: &FetchContext) -> Result<IconDetail> {
        let detail_url = if summary.detail_url.trim().is_empty() {
            to_abs(CAINIAO.origin, &format!("/detail/{}.html", summary.id.trim()))
        } else {
            summary.detail_url.trim().to_string()
        };
        let html = self
            .http
            .fetch_text(&detail_url, &Self::page_request(), CAINIAO.origin)
            .await?;
        Ok(parse_detail_page(&html, summary, &detail_url, &ctx.i18n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_skips_items_without_id_or_svg() {
        let html = r#"<html><body>
            <div class="icon-item" data-id="1"><div class="icon-content"><svg viewBox="0 0 1 1"><path d="M0"></path></svg></div>
              <a href="/detail/1.html"> Cat </a></div>
            <div class="icon-item"><div class="icon-content"><svg></svg></div></div>
            <div class="icon-item" data-id="2"><p>no svg</p></div>
            <div class="icon-item" data-id="1"><div class="icon-content"><svg></svg></div></div>
            <div class="icon-item" data-id="3"><div class="icon-content"><svg></svg></div><p> Dog  face </p></div>
        </body></html>"#;
        let items = parse_search_page(html);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Cat");
        assert_eq!(items[0].detail_url, "https://icon.sucai999.com/detail/1.html");
        assert!(items[0].preview_svg.starts_with("<svg"));
        assert_eq!(items[1].name, "Dog face");
        assert_eq!(items[1].detail_url, "https://icon.sucai999.com/detail/3.html");
    }

    #[test]
    fn detail_defaults_when_page_is_bare() {
        let summary = IconSummary {
            provider: "cainiao".into(),
            id: "9".into(),
            name: "“Bird”".into(),
            preview_svg: "<svg></svg>".into(),
            detail_url: String::new(),
        };
        let d = parse_detail_page("<html><body></body></html>", &summary, "u", &I18n::default());
        assert_eq!(d.title, "Bird");
        assert_eq!(d.author, "unknown author");
        assert_eq!(d.license, "unlabeled");
        assert_eq!(d.svg, "<svg></svg>");
        assert_eq!(d.default_color, FALLBACK_COLOR);
        assert!(d.usage_lines.is_empty());
    }

    #[test]
    fn search_url_encodes_keyword() {
        assert_eq!(
            search_url("猫 咪"),
            "https://icon.sucai999.com/s-%E7%8C%AB%20%E5%92%AA-1.html"
        );
    }
}
