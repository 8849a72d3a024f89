// tests/svg_properties.rs
//
// Behavioral properties of the SVG normalizer and color helpers.

use icon_market::color::{build_palette, extract_colors, normalize_hex, FALLBACK_COLOR, MAX_PALETTE};
use icon_market::svg::{apply_color, sanitize};
use regex::Regex;

const ICON: &str = r##"<svg viewBox="0 0 24 24" xmlns="http://www.w3.org/2000/svg"><defs><linearGradient id="g"><stop offset="0" stop-color="#ff0000"/></linearGradient></defs><path d="M0 0h4" fill="#111111" stroke="#222222"/><path d="M1 1h4" fill="none"/><rect width="2" height="2" style="fill:#333333;stroke:transparent"/><circle r="3" fill="url(#g)"/><g><polygon points="0,0 1,1"/></g></svg>"##;

fn color_values(markup: &str) -> Vec<String> {
    let re = Regex::new(r#"(fill|stroke|stop-color|color)\s*[=:]\s*"?([^";]+)"#).unwrap();
    let mut out: Vec<String> = re
        .captures_iter(markup)
        .map(|c| format!("{}={}", &c[1], c[2].trim()))
        .collect();
    out.sort();
    out
}

#[test]
fn recoloring_twice_does_not_drift() {
    let once = apply_color(ICON, "#2563eb");
    let twice = apply_color(&once, "#2563eb");
    assert_eq!(color_values(&once), color_values(&twice));
    assert_eq!(once, twice);
}

#[test]
fn protected_values_survive_recoloring() {
    let out = apply_color(ICON, "#2563EB");
    assert!(out.contains(r#"fill="none""#));
    assert!(out.contains(r#"fill="url(#g)""#));
    assert!(out.contains("stroke:transparent"));
    assert!(out.contains(r##"stop-color="#2563eb""##));
    assert!(out.contains("fill:#2563eb"));
    assert!(!out.contains("#111111"));
    assert!(!out.contains("#222222"));
}

#[test]
fn bare_shapes_pick_up_the_color() {
    let out = apply_color(ICON, "#10b981");
    let polygon = Regex::new(r"<polygon[^>]*>").unwrap();
    let tag = polygon.find(&out).expect("polygon kept").as_str();
    assert!(tag.contains(r##"fill="#10b981""##), "{tag}");
}

#[test]
fn invalid_target_falls_back_to_neutral_gray() {
    let out = apply_color(r##"<svg><path fill="#000000"/></svg>"##, "chartreuse-ish");
    assert!(out.contains(&format!(r#"fill="{FALLBACK_COLOR}""#)));
}

#[test]
fn broken_markup_is_returned_unchanged() {
    let broken = r##"<svg><path fill="#000"></svg>"##;
    assert_eq!(apply_color(broken, "#ffffff"), broken);
    assert_eq!(sanitize(broken), "");
}

#[test]
fn sanitize_removes_script_and_handlers() {
    let dirty = r##"<svg id="x" onload="boot()"><script>alert(1)</script><foreignObject><div>hi</div></foreignObject><path onclick="steal()" d="M0 0"/></svg>"##;
    let clean = sanitize(dirty);
    assert!(clean.starts_with("<svg"));
    assert!(clean.ends_with("</svg>"));
    for needle in ["script", "alert", "onclick", "onload", "foreignObject", r#"id="x""#] {
        assert!(!clean.contains(needle), "{needle} leaked: {clean}");
    }
    assert!(clean.contains(r#"d="M0 0""#));
}

#[test]
fn palette_rules() {
    assert_eq!(
        extract_colors(&["#fff #000000 #ff00ff80 garbage"]),
        vec!["#ffffff", "#000000", "#ff00ff"]
    );
    assert_eq!(normalize_hex("#ABC").as_deref(), Some("#aabbcc"));
    assert_eq!(normalize_hex("#11223344").as_deref(), Some("#112233"));
    assert_eq!(normalize_hex("not-a-color"), None);

    let many: Vec<String> = (0..40).map(|i| format!("#0000{i:02x}")).collect();
    let palette = build_palette("#ABC", &many);
    assert_eq!(palette.len(), MAX_PALETTE);
    assert_eq!(palette[0], "#aabbcc");

    let seeded = build_palette("bogus", &[]);
    assert_eq!(seeded[0], FALLBACK_COLOR);
    assert!(seeded.iter().all(|c| c.len() == 7 && c.starts_with('#')));
}

#[test]
fn script_links_never_survive_sanitizing() {
    let out = sanitize(
        r#"<svg viewBox="0 0 1 1"><a href="javascript:alert(1)"><rect/></a><use xlink:href="javascript:x()"/></svg>"#,
    );
    assert!(!out.is_empty());
    assert!(!out.contains("javascript:"), "{out}");
}
