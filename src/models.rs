//! Data records flowing through the search → detail → import pipeline.

use serde::{Deserialize, Serialize};

/// Lightweight search-result record.
///
/// Unique per `(provider, id)` within one search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IconSummary {
    pub provider: String,
    /// Catalog-native id.
    pub id: String,
    pub name: String,
    /// Raw (unsanitized) preview markup.
    pub preview_svg: String,
    pub detail_url: String,
}

/// Fully resolved metadata and canonical SVG for one icon.
///
/// Produced once per detail fetch and shared read-only (`Arc<IconDetail>`)
/// afterwards; a re-fetch produces a new value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IconDetail {
    pub title: String,
    pub author: String,
    pub author_url: String,
    pub avatar_url: String,
    /// `YYYY-MM-DD` or empty.
    pub updated_at: String,
    pub license: String,
    pub license_url: String,
    pub usage_lines: Vec<String>,
    pub usage_link_url: String,
    /// Canonical raw markup (preview and stored file derive from it).
    pub svg: String,
    /// Always a valid `#rrggbb`.
    pub default_color: String,
    /// At most 16 valid `#rrggbb` values, first-seen order.
    pub palette_colors: Vec<String>,
    pub detail_url: String,

    // Provider-specific extras.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commercial_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favor_count: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub copyright_url: String,
    /// `free` | `charge` | empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fees: String,
    /// `original` | `opensource` | empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub copyright_type: String,
}

/// Outcome of the import dialog. Transient, never persisted.
/// Missing fields deserialize to the dismissed defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportDecision {
    pub confirmed: bool,
    pub keep_original_color: bool,
    /// `#rrggbb` or empty; ignored when `keep_original_color` is set.
    pub selected_color: String,
}

impl ImportDecision {
    /// Decision produced when the dialog is dismissed.
    pub fn dismissed() -> Self {
        Self {
            confirmed: false,
            keep_original_color: true,
            selected_color: String::new(),
        }
    }

    pub fn recolor(color: impl Into<String>) -> Self {
        Self {
            confirmed: true,
            keep_original_color: false,
            selected_color: color.into(),
        }
    }

    pub fn keep_original() -> Self {
        Self {
            confirmed: true,
            keep_original_color: true,
            selected_color: String::new(),
        }
    }

    /// Target color to apply, if any.
    pub fn color_to_apply(&self) -> Option<&str> {
        let c = self.selected_color.trim();
        if self.keep_original_color || c.is_empty() {
            None
        } else {
            Some(c)
        }
    }
}

impl Default for ImportDecision {
    fn default() -> Self {
        Self::dismissed()
    }
}

/// The stored artifact, addressed as `<source.dir>/<file_name>`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedIcon {
    /// External address, e.g. `iconfont/cat-123.svg`.
    pub path: String,
    pub file_name: String,
    /// Storage root that accepted the write.
    pub root: String,
    pub bytes: usize,
}
