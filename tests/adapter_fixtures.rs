// tests/adapter_fixtures.rs
//
// Conformance tests: saved catalog responses through the real adapters,
// served by a routed HttpFetch stub (no network).

mod common;

use std::sync::Arc;

use common::{fixture, summary, RoutedHttp};
use icon_market::adapters::{CainiaoSource, FetchContext, IconSource, IconfontSource};
use icon_market::error::MarketError;
use icon_market::i18n::{I18n, Locale};
use icon_market::sources::ICONFONT_COPYRIGHT_TERMS_URL;

fn ctx() -> FetchContext {
    FetchContext {
        max_results: 10,
        i18n: I18n::default(),
    }
}

#[tokio::test]
async fn iconfont_search_fixture() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://www.iconfont.cn/api/icon/search.json",
        fixture("iconfont_search.json"),
    ));
    let source = IconfontSource::new(http.clone());
    let items = source.search("cat", &ctx()).await.expect("search ok");

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["101", "102", "104"], "duplicate and markup-less rows skipped");

    assert_eq!(items[0].name, "cat");
    assert_eq!(items[1].name, "cat-paw", "font_class fallback");
    assert_eq!(items[2].name, "cat-face", "slug fallback");
    assert_eq!(
        items[0].detail_url,
        "https://www.iconfont.cn/icons/detail?icon_id=101"
    );
    assert!(items[1].preview_svg.contains(r#"viewBox="0 0 24 1024""#));
    assert!(items[1].preview_svg.contains(r##"<path d="M1 1h2v2z" fill="#00ff00" />"##));
    assert!(items[2].preview_svg.contains("<circle"));

    let requests = http.requests();
    let (url, req) = &requests[0];
    assert!(url.contains("count=20"), "asks for twice the cap: {url}");
    assert_eq!(req.method(), "POST");
    assert_eq!(req.header_value("x-requested-with"), Some("XMLHttpRequest"));
    assert!(req
        .header_value("referer")
        .is_some_and(|r| r.contains("searchType=icon&q=cat")));
}

#[tokio::test]
async fn iconfont_detail_fixture() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://www.iconfont.cn/api/icon/iconInfo.json?id=101",
        fixture("iconfont_detail.json"),
    ));
    let source = IconfontSource::new(http);
    let detail = source
        .detail(&summary("iconfont", "101", "cat"), &ctx())
        .await
        .expect("detail ok");

    assert_eq!(detail.title, "Cat");
    assert_eq!(detail.author, "Mao");
    assert_eq!(
        detail.author_url,
        "https://www.iconfont.cn/user/detail?uid=55&nid=n1"
    );
    assert_eq!(detail.avatar_url, "https://img.alicdn.com/avatar/a.png");
    assert_eq!(detail.updated_at, "2023-05-06");
    assert_eq!(detail.license, "Original");
    assert_eq!(detail.license_url, ICONFONT_COPYRIGHT_TERMS_URL);
    assert_eq!(detail.collection_name, "Animals");
    assert_eq!(
        detail.collection_url,
        "https://www.iconfont.cn/collections/detail?cid=9"
    );
    assert_eq!(detail.tags, vec!["cat", "kitty", "pet"]);
    assert_eq!(detail.favor_count, 12);
    assert_eq!(detail.fees, "free");
    assert_eq!(detail.palette_colors, vec!["#333333", "#ff0000"]);
    assert_eq!(detail.default_color, "#333333");
    assert!(detail.svg.contains(r##"fill="#F00""##), "origin_file wins");
    assert_eq!(
        detail.detail_url,
        "https://www.iconfont.cn/detail/index?icon_id=101"
    );
}

#[tokio::test]
async fn iconfont_envelope_failure_is_upstream_error() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://www.iconfont.cn/api/icon/search.json",
        r#"{"code": 500, "message": "too many requests"}"#.to_string(),
    ));
    let err = IconfontSource::new(http)
        .search("cat", &ctx())
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::upstream("iconfont", "too many requests"));
}

#[tokio::test]
async fn iconfont_garbage_body_is_parse_error() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://www.iconfont.cn/api/icon/search.json",
        "<html>captcha</html>".to_string(),
    ));
    let err = IconfontSource::new(http)
        .search("cat", &ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn cainiao_search_fixture() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://icon.sucai999.com/s-",
        fixture("cainiao_search.html"),
    ));
    let source = CainiaoSource::new(http.clone());
    let items = source.search("猫 咪", &ctx()).await.expect("search ok");

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["7001", "7002"]);
    assert_eq!(items[0].name, "Sleepy Cat");
    assert_eq!(items[0].detail_url, "https://icon.sucai999.com/detail/7001.html");
    assert_eq!(items[1].name, "Round Cat", "first <p> when no anchor");
    assert_eq!(items[1].detail_url, "https://icon.sucai999.com/detail/7002.html");
    assert!(items[0].preview_svg.starts_with("<svg"));

    let (url, _) = &http.requests()[0];
    assert_eq!(url, "https://icon.sucai999.com/s-%E7%8C%AB%20%E5%92%AA-1.html");
}

#[tokio::test]
async fn cainiao_detail_fixture() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://icon.sucai999.com/detail/7001.html",
        fixture("cainiao_detail.html"),
    ));
    let source = CainiaoSource::new(http);
    let mut hit = summary("cainiao", "7001", "Sleepy Cat");
    hit.detail_url = "https://icon.sucai999.com/detail/7001.html".into();
    let detail = source.detail(&hit, &ctx()).await.expect("detail ok");

    assert_eq!(detail.title, "Sleepy Cat");
    assert_eq!(detail.author, "Lan");
    assert_eq!(detail.author_url, "https://icon.sucai999.com/user/42.html");
    assert_eq!(detail.license, "CC BY 4.0");
    assert_eq!(detail.license_url, "https://icon.sucai999.com/license/cc.html");
    assert_eq!(
        detail.usage_lines,
        vec!["商用使用范围：可商用", "修改与衍生：允许"]
    );
    assert_eq!(detail.usage_link_url, "https://icon.sucai999.com/xieyi.html");
    assert_eq!(detail.default_color, "#ec4899");
    assert_eq!(detail.palette_colors, vec!["#ec4899", "#111827"]);
    assert!(detail.svg.contains("M1 1h22v22z"), "svg-box markup, not the header logo");
    assert_eq!(detail.detail_url, "https://icon.sucai999.com/detail/7001.html");
}

#[tokio::test]
async fn cainiao_sparse_detail_uses_localized_fallbacks() {
    let http = Arc::new(RoutedHttp::new().route(
        "https://icon.sucai999.com/detail/",
        "<html><body><p>nothing here</p></body></html>".to_string(),
    ));
    let source = CainiaoSource::new(http);
    let mut hit = summary("cainiao", "9", "");
    hit.detail_url.clear();
    let zh = FetchContext {
        max_results: 10,
        i18n: I18n::new(Locale::ZhCn),
    };
    let detail = source.detail(&hit, &zh).await.expect("detail ok");

    assert_eq!(detail.author, "未知作者");
    assert_eq!(detail.license, "未标注");
    assert_eq!(detail.title, "未命名");
    assert_eq!(detail.default_color, "#64748b");
    assert_eq!(detail.svg, hit.preview_svg.trim());
    assert_eq!(detail.detail_url, "https://icon.sucai999.com/detail/9.html");
}
