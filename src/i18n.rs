// src/i18n.rs
//! Localized user-facing messages (`en`, `zh_CN`).
//!
//! `{{name}}` placeholders are substituted from the params slice; unknown
//! placeholders render empty and unknown keys render as the key itself.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en", alias = "en_US")]
    En,
    #[serde(rename = "zh_CN", alias = "zh-CN", alias = "zh")]
    ZhCn,
}

impl Locale {
    /// Lenient parse; anything unrecognized is English.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "zh_cn" | "zh" | "zh_hans" => Self::ZhCn,
            _ => Self::En,
        }
    }
}

const EN: &[(&str, &str)] = &[
    ("storeTitle", "Icon Market"),
    ("searching", "Searching..."),
    ("settingsNoSourceEnabled", "No icon source is enabled. Enable one in settings."),
    ("searchFailed", "Search failed: {{msg}}"),
    ("sourceSearchFailed", "{{source}} search failed: {{msg}}"),
    ("noResults", "No results for \"{{kw}}\""),
    ("downloadFailed", "Import from {{source}} failed: {{msg}}"),
    ("unnamed", "unnamed"),
    ("unknownAuthor", "unknown author"),
    ("unlabeled", "unlabeled"),
    ("licenseOpenSource", "Open source"),
    ("licenseOriginal", "Original"),
    ("errorNoSvg", "This icon has no SVG markup"),
    ("errorInvalidSvg", "The SVG markup is invalid"),
    ("errorWriteFile", "Failed to write the icon file"),
    ("previewUnavailable", "Preview unavailable"),
    ("consentRequired", "Please confirm the license terms before importing"),
    (
        "usageCommercialNotice",
        "Commercial use may require permission from the author or platform.",
    ),
    (
        "usagePluginDisclaimer",
        "This tool only helps you fetch icons; check each icon's license yourself.",
    ),
    ("unknownSource", "Unknown source: {{source}}"),
];

const ZH_CN: &[(&str, &str)] = &[
    ("storeTitle", "图标市场"),
    ("searching", "搜索中..."),
    ("settingsNoSourceEnabled", "未启用任何图标源，请在设置中开启。"),
    ("searchFailed", "搜索失败：{{msg}}"),
    ("sourceSearchFailed", "{{source}} 搜索失败：{{msg}}"),
    ("noResults", "没有找到“{{kw}}”的结果"),
    ("downloadFailed", "从 {{source}} 导入失败：{{msg}}"),
    ("unnamed", "未命名"),
    ("unknownAuthor", "未知作者"),
    ("unlabeled", "未标注"),
    ("licenseOpenSource", "开源"),
    ("licenseOriginal", "原创"),
    ("errorNoSvg", "该图标没有 SVG 内容"),
    ("errorInvalidSvg", "SVG 内容无效"),
    ("errorWriteFile", "写入图标文件失败"),
    ("previewUnavailable", "无法预览"),
    ("consentRequired", "请先确认授权条款再导入"),
    ("usageCommercialNotice", "商业使用可能需要获得作者或平台的授权。"),
    ("usagePluginDisclaimer", "本工具仅协助获取图标，请自行确认每个图标的授权。"),
    ("unknownSource", "未知图标源：{{source}}"),
];

/// Message table for one locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct I18n {
    locale: Locale,
}

impl I18n {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn table(&self) -> &'static [(&'static str, &'static str)] {
        match self.locale {
            Locale::En => EN,
            Locale::ZhCn => ZH_CN,
        }
    }

    /// Translate `key`, substituting `{{name}}` placeholders from `params`.
    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        let raw = self
            .table()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(key);
        RE_PLACEHOLDER
            .replace_all(raw, |c: &Captures| {
                params
                    .iter()
                    .find(|(name, _)| *name == &c[1])
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default()
            })
            .into_owned()
    }

    /// Shorthand for parameterless keys.
    pub fn label(&self, key: &str) -> String {
        self.t(key, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_and_blanks_unknown_params() {
        let en = I18n::new(Locale::En);
        assert_eq!(
            en.t("sourceSearchFailed", &[("source", "cainiao"), ("msg", "HTTP 500")]),
            "cainiao search failed: HTTP 500"
        );
        assert_eq!(en.t("searchFailed", &[]), "Search failed: ");
    }

    #[test]
    fn unknown_key_renders_itself() {
        assert_eq!(I18n::default().label("doesNotExist"), "doesNotExist");
    }

    #[test]
    fn tables_share_keys() {
        for (k, _) in EN {
            assert!(ZH_CN.iter().any(|(z, _)| z == k), "zh_CN missing {k}");
        }
        assert_eq!(Locale::parse("zh-CN"), Locale::ZhCn);
        assert_eq!(I18n::new(Locale::ZhCn).label("unnamed"), "未命名");
    }
}
