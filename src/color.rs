//! Hex color normalization and palette extraction.

use once_cell::sync::Lazy;
use regex::Regex;

/// Neutral gray used whenever no usable color can be derived.
pub const FALLBACK_COLOR: &str = "#64748b";

/// Standard swatches appended to every palette.
pub const SWATCHES: [&str; 10] = [
    "#64748b", "#111827", "#334155", "#2563eb", "#06b6d4", "#10b981", "#f59e0b", "#ef4444",
    "#7c3aed", "#ec4899",
];

pub const MAX_PALETTE: usize = 16;

static RE_HEX_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[0-9a-fA-F]{3,8}").expect("hex token regex"));
static RE_RGB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})(?:\s*,\s*[\d.]+)?\s*\)$")
        .expect("rgb regex")
});

/// Canonical lowercase `#rrggbb`, or `None` for anything that is not a
/// `#`-prefixed 3, 6 or 8 digit hex value. Alpha is dropped.
pub fn normalize_hex(v: &str) -> Option<String> {
    let body = v.trim().strip_prefix('#')?;
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let lower = body.to_ascii_lowercase();
    match lower.len() {
        3 => Some(lower.chars().fold(String::from("#"), |mut acc, c| {
            acc.push(c);
            acc.push(c);
            acc
        })),
        6 => Some(format!("#{lower}")),
        8 => Some(format!("#{}", &lower[..6])),
        _ => None,
    }
}

pub fn is_hex(v: &str) -> bool {
    normalize_hex(v).is_some()
}

/// `rgb(r, g, b)` / `rgba(r, g, b, a)` to `#rrggbb`; channels clamp to 255.
pub fn rgb_to_hex(v: &str) -> Option<String> {
    let caps = RE_RGB.captures(v.trim())?;
    let mut out = String::from("#");
    for i in 1..=3 {
        let n: u16 = caps[i].parse().ok()?;
        out.push_str(&format!("{:02x}", n.min(255)));
    }
    Some(out)
}

/// Accept either hex or rgb()/rgba() notation.
pub fn parse_css_color(v: &str) -> Option<String> {
    normalize_hex(v).or_else(|| rgb_to_hex(v))
}

/// Scan text fragments for hex tokens. Deduplicated, first-seen order, capped.
pub fn extract_colors(texts: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for text in texts {
        for m in RE_HEX_TOKEN.find_iter(text) {
            if let Some(h) = normalize_hex(m.as_str()) {
                if !out.contains(&h) {
                    out.push(h);
                }
            }
        }
    }
    out.truncate(MAX_PALETTE);
    out
}

/// Default color, then the detail palette, then the standard swatches.
pub fn build_palette(default_color: &str, palette: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_PALETTE);
    let candidates = std::iter::once(default_color)
        .chain(palette.iter().map(String::as_str))
        .chain(SWATCHES.iter().copied());
    for c in candidates {
        if let Some(h) = normalize_hex(c) {
            if !out.contains(&h) {
                out.push(h);
            }
        }
        if out.len() == MAX_PALETTE {
            break;
        }
    }
    out
}
