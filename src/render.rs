// src/render.rs
//! View model for the search panel and the render targets that draw it.
//!
//! The core builds a [`PanelView`] and hands it to whatever [`RenderTarget`]
//! the embedder uses; the binary ships [`HtmlPanel`].

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Serialize;

use crate::i18n::I18n;
use crate::orchestrator::SearchResults;
use crate::settings::Settings;
use crate::sources::Source;
use crate::svg;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PanelItem {
    pub id: String,
    pub name: String,
    /// Sanitized, viewBox-fitted markup; empty when the preview is unusable.
    pub preview_svg: String,
    pub detail_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SectionBody {
    Items(Vec<PanelItem>),
    /// Localized "no results" line.
    Empty(String),
    /// Localized failure line.
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSection {
    pub source_id: String,
    pub name: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub title: String,
    pub keyword: String,
    /// Panel-wide notice, e.g. when every source is disabled.
    pub notice: Option<String>,
    pub sections: Vec<SourceSection>,
}

impl PanelView {
    /// Panel with no sections (empty keyword).
    pub fn cleared(i18n: &I18n) -> Self {
        Self {
            title: i18n.t("storeTitle", &[]),
            keyword: String::new(),
            notice: None,
            sections: Vec::new(),
        }
    }

    /// One section per enabled source, in the given order, capped per source.
    pub fn from_results(
        keyword: &str,
        results: &SearchResults,
        enabled: &[&'static Source],
        settings: &Settings,
        i18n: &I18n,
    ) -> Self {
        let kw = keyword.trim();
        let notice = enabled
            .is_empty()
            .then(|| i18n.t("settingsNoSourceEnabled", &[]));

        let sections = enabled
            .iter()
            .filter_map(|source| {
                let outcome = results.get(source.id)?;
                let body = match &outcome.error {
                    Some(err) => SectionBody::Failed(i18n.t(
                        "sourceSearchFailed",
                        &[("source", source.name), ("msg", &err.to_string())],
                    )),
                    None if outcome.items.is_empty() => {
                        SectionBody::Empty(i18n.t("noResults", &[("kw", kw)]))
                    }
                    None => SectionBody::Items(
                        outcome
                            .items
                            .iter()
                            .take(settings.max_per_source(source.id) as usize)
                            .map(|s| PanelItem {
                                id: s.id.clone(),
                                name: s.name.clone(),
                                preview_svg: svg::fit_preview(&s.preview_svg).unwrap_or_default(),
                                detail_url: s.detail_url.clone(),
                            })
                            .collect(),
                    ),
                };
                Some(SourceSection {
                    source_id: source.id.to_string(),
                    name: source.name.to_string(),
                    body,
                })
            })
            .collect();

        Self {
            title: i18n.t("storeTitle", &[]),
            keyword: kw.to_string(),
            notice,
            sections,
        }
    }

    pub fn item_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| match &s.body {
                SectionBody::Items(items) => items.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Narrow seam between the core and a UI toolkit.
pub trait RenderTarget {
    type Output;

    fn render(&self, view: &PanelView) -> Self::Output;
}

/// Self-contained HTML fragment; class names are stable for styling hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlPanel;

impl RenderTarget for HtmlPanel {
    type Output = String;

    fn render(&self, view: &PanelView) -> String {
        let mut out = String::with_capacity(1024);
        out.push_str(&format!(
            r#"<section class="icon-market" data-keyword="{}">"#,
            attr(&view.keyword)
        ));
        out.push_str(&format!(
            r#"<h2 class="icon-market__title">{}</h2>"#,
            text(&view.title)
        ));
        if let Some(notice) = &view.notice {
            out.push_str(&format!(
                r#"<p class="icon-market__notice">{}</p>"#,
                text(notice)
            ));
        }
        for section in &view.sections {
            out.push_str(&format!(
                r#"<div class="icon-market__source" data-source="{}"><h3>{}</h3>"#,
                attr(&section.source_id),
                text(&section.name)
            ));
            match &section.body {
                SectionBody::Items(items) => {
                    out.push_str(r#"<ul class="icon-market__grid">"#);
                    for item in items {
                        out.push_str(&format!(
                            r#"<li class="icon-market__item" data-id="{}" data-detail="{}" title="{}">{}<span>{}</span></li>"#,
                            attr(&item.id),
                            attr(&item.detail_url),
                            attr(&item.name),
                            item.preview_svg,
                            text(&item.name)
                        ));
                    }
                    out.push_str("</ul>");
                }
                SectionBody::Empty(msg) => out.push_str(&format!(
                    r#"<p class="icon-market__empty">{}</p>"#,
                    text(msg)
                )),
                SectionBody::Failed(msg) => out.push_str(&format!(
                    r#"<p class="icon-market__error">{}</p>"#,
                    text(msg)
                )),
            }
            out.push_str("</div>");
        }
        out.push_str("</section>");
        out
    }
}
