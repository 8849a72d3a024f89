//! # Sources
//! Static descriptors of the supported icon catalogs.
//!
//! One descriptor per catalog, fixed at compile time. Adapters, settings and
//! storage all refer to catalogs by `Source::id`.

use serde::Serialize;

/// Immutable catalog descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Source {
    pub id: &'static str,
    pub name: &'static str,
    /// Base URL without trailing slash.
    pub origin: &'static str,
    /// Subdirectory under the storage root.
    pub dir: &'static str,
}

pub const ICONFONT: Source = Source {
    id: "iconfont",
    name: "阿里巴巴矢量库",
    origin: "https://www.iconfont.cn",
    dir: "iconfont",
};

pub const CAINIAO: Source = Source {
    id: "cainiao",
    name: "菜鸟图标",
    origin: "https://icon.sucai999.com",
    dir: "cainiao",
};

/// Built-in catalogs in display order.
pub const SOURCES: [Source; 2] = [ICONFONT, CAINIAO];

/// Copyright terms page used as license/usage link for iconfont icons.
pub const ICONFONT_COPYRIGHT_TERMS_URL: &str = "https://terms.alicdn.com/legal-agreement/terms/platform_service/20220704165734807/20220704165734807.html";

pub fn find(id: &str) -> Option<&'static Source> {
    SOURCES.iter().find(|s| s.id == id)
}
