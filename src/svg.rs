//! # SVG normalizer / recolorer
//!
//! Untrusted markup is streamed through a quick-xml reader and re-emitted by a
//! writer. Every element (root included) is handed to a visitor which may
//! rewrite its attributes or drop the whole subtree. Anything before the root
//! element (XML declaration, doctype, comments) is discarded.
//!
//! - [`sanitize`] strips script-capable constructs; empty string on failure.
//! - [`apply_color`] rewrites color-bearing attributes; input returned
//!   unchanged on failure.
//! - [`fit_preview`] makes an icon scale to its container.

use std::io::Cursor;

use quick_xml::{
    events::{BytesStart, Event},
    Reader, Writer,
};
use tracing::debug;

use crate::color::{normalize_hex, FALLBACK_COLOR};
use crate::error::{MarketError, Result};

/// Attributes whose value is a paint/color.
const COLOR_ATTRS: [&str; 4] = ["fill", "stroke", "stop-color", "color"];

/// Elements that receive an explicit fill when they carry no paint at all.
const SHAPES: [&str; 11] = [
    "path", "circle", "rect", "polygon", "polyline", "ellipse", "line", "use", "g", "text", "tspan",
];

/// Plugin-internal bookkeeping attribute left by older exports.
const BOOKKEEPING_ATTR: &str = "data-colorindex";

/// One element as seen by a visitor. Attribute values are unescaped.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub is_root: bool,
}

impl Element {
    /// Name without namespace prefix, lowercased.
    pub fn local_name(&self) -> String {
        let n = self.name.rsplit(':').next().unwrap_or(&self.name);
        n.to_ascii_lowercase()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    fn to_start(&self) -> BytesStart<'static> {
        let mut start = BytesStart::new(self.name.clone());
        for (k, v) in &self.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Remove the element and everything inside it.
    Drop,
}

fn parse_err(e: impl std::fmt::Display) -> MarketError {
    MarketError::Parse(format!("svg: {e}"))
}

fn read_element(start: &BytesStart<'_>, is_root: bool) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(parse_err)?
        .to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_err)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(parse_err)?
            .to_string();
        let value = attr.unescape_value().map_err(parse_err)?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        is_root,
    })
}

/// Stream `markup` through `visit`, re-serializing the root `<svg>` element.
pub fn transform<F>(markup: &str, mut visit: F) -> Result<String>
where
    F: FnMut(&mut Element) -> Verdict,
{
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(markup.len())));

    let mut depth = 0usize;
    let mut skip = 0usize;
    let mut root_seen = false;
    let mut root_closed = false;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(parse_err(format!(
                    "at position {}: {e}",
                    reader.error_position()
                )))
            }
        };
        match event {
            Event::Start(_) if skip > 0 => {
                skip += 1;
                depth += 1;
            }
            Event::End(_) if skip > 0 => {
                skip -= 1;
                depth -= 1;
            }
            _ if skip > 0 => {}
            Event::Start(start) => {
                let is_root = depth == 0;
                check_root(&start, is_root, root_closed)?;
                root_seen = true;
                let mut el = read_element(&start, is_root)?;
                if visit(&mut el) == Verdict::Drop && !is_root {
                    skip = 1;
                } else {
                    writer
                        .write_event(Event::Start(el.to_start()))
                        .map_err(parse_err)?;
                }
                depth += 1;
            }
            Event::Empty(start) => {
                let is_root = depth == 0;
                check_root(&start, is_root, root_closed)?;
                root_seen = true;
                let mut el = read_element(&start, is_root)?;
                if visit(&mut el) == Verdict::Keep || is_root {
                    writer
                        .write_event(Event::Empty(el.to_start()))
                        .map_err(parse_err)?;
                }
                if is_root {
                    root_closed = true;
                }
            }
            Event::End(end) => {
                if depth == 0 {
                    return Err(parse_err("unexpected closing tag"));
                }
                depth -= 1;
                writer.write_event(Event::End(end)).map_err(parse_err)?;
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            Event::Text(text) if depth == 0 => {
                let raw = text.unescape().map_err(parse_err)?;
                if !raw.trim().is_empty() {
                    return Err(parse_err("text outside the root element"));
                }
            }
            // Prolog and anything trailing the root are dropped.
            _ if depth == 0 => {}
            other => writer.write_event(other).map_err(parse_err)?,
        }
    }

    if !root_seen {
        return Err(parse_err("no root element"));
    }
    if depth > 0 {
        return Err(parse_err("unclosed root element"));
    }
    String::from_utf8(writer.into_inner().into_inner()).map_err(parse_err)
}

fn check_root(start: &BytesStart<'_>, is_root: bool, root_closed: bool) -> Result<()> {
    if !is_root {
        return Ok(());
    }
    if root_closed {
        return Err(parse_err("more than one root element"));
    }
    let local = start.local_name();
    if !local.as_ref().eq_ignore_ascii_case(b"svg") {
        return Err(parse_err("root element is not <svg>"));
    }
    Ok(())
}

fn is_event_handler(attr: &str) -> bool {
    attr.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("on"))
}

/// `href`/`xlink:href` pointing at a script URL. Whitespace and control
/// characters inside the scheme are ignored, as browsers do.
fn is_script_link(attr: &str, value: &str) -> bool {
    let local = attr.rsplit(':').next().unwrap_or(attr);
    if !local.eq_ignore_ascii_case("href") {
        return false;
    }
    let scheme: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take("javascript:".len())
        .collect();
    scheme.eq_ignore_ascii_case("javascript:")
}

/// Strip unsafe or host-specific constructs from untrusted markup.
///
/// Returns an empty string when the markup is not a single well-formed
/// `<svg>` document.
pub fn sanitize(markup: &str) -> String {
    let result = transform(markup, |el| {
        let local = el.local_name();
        if local == "script" || local == "foreignobject" {
            return Verdict::Drop;
        }
        if el.is_root {
            el.remove("id");
            el.remove("class");
            el.remove("style");
        }
        el.attrs.retain(|(k, v)| {
            !is_event_handler(k) && k != BOOKKEEPING_ATTR && !is_script_link(k, v)
        });
        Verdict::Keep
    });
    match result {
        Ok(clean) => clean,
        Err(e) => {
            debug!(target: "svg", error = %e, len = markup.len(), "sanitize rejected markup");
            String::new()
        }
    }
}

/// Values that must never be overwritten: no paint, inheritance, or a
/// gradient/pattern reference.
fn is_replaceable(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    !(v.is_empty()
        || v == "none"
        || v == "transparent"
        || v == "inherit"
        || v.starts_with("url("))
}

fn recolor_style(style: &str, target: &str) -> String {
    style
        .split(';')
        .map(|decl| {
            let Some((prop, value)) = decl.split_once(':') else {
                return decl.to_string();
            };
            let p = prop.trim().to_ascii_lowercase();
            if COLOR_ATTRS.contains(&p.as_str()) && is_replaceable(value) {
                format!("{}:{target}", prop.trim())
            } else {
                decl.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Rewrite every color-bearing attribute and style declaration to `color`.
///
/// `color` is normalized first; invalid input falls back to the neutral gray.
pub fn apply_color(markup: &str, color: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }
    let target = normalize_hex(color).unwrap_or_else(|| FALLBACK_COLOR.to_string());

    let result = transform(markup, |el| {
        el.remove(BOOKKEEPING_ATTR);
        for attr in COLOR_ATTRS {
            if el.get(attr).is_some_and(is_replaceable) {
                el.set(attr, target.as_str());
            }
        }
        let style = el.get("style").map(str::to_string);
        if let Some(style) = &style {
            let replaced = recolor_style(style, &target);
            if &replaced != style {
                el.set("style", replaced);
            }
        }
        if !el.is_root
            && SHAPES.contains(&el.local_name().as_str())
            && !el.has("fill")
            && !el.has("stroke")
            && !style.as_deref().unwrap_or("").contains("fill")
        {
            el.set("fill", target.as_str());
        }
        Verdict::Keep
    });
    match result {
        Ok(out) => out,
        Err(e) => {
            debug!(target: "svg", error = %e, "recolor skipped, keeping original markup");
            markup.to_string()
        }
    }
}

fn leading_number(v: &str) -> Option<f64> {
    let t = v.trim();
    let end = t
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    t[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

fn fmt_dim(n: f64) -> String {
    let n = n.max(1.0);
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Sanitize and make the root scale to its container: derive a `viewBox`
/// from `width`/`height` when missing, drop fixed sizing, center the
/// artwork. `None` when the markup is unusable.
pub fn fit_preview(markup: &str) -> Option<String> {
    let clean = sanitize(markup);
    if clean.is_empty() {
        return None;
    }
    transform(&clean, |el| {
        if el.is_root {
            if !el.has("viewBox") {
                let w = el.get("width").and_then(leading_number);
                let h = el.get("height").and_then(leading_number);
                if let (Some(w), Some(h)) = (w, h) {
                    el.set("viewBox", format!("0 0 {} {}", fmt_dim(w), fmt_dim(h)));
                }
            }
            el.remove("width");
            el.remove("height");
            el.remove("style");
            el.set("preserveAspectRatio", "xMidYMid meet");
        }
        Verdict::Keep
    })
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_non_svg_root() {
        assert_eq!(sanitize("<div><svg/></div>"), "");
        assert_eq!(sanitize("not markup at all"), "");
        assert_eq!(sanitize("<svg><path></svg>"), "");
    }

    #[test]
    fn sanitize_strips_root_presentation_and_bookkeeping() {
        let out = sanitize(
            r#"<?xml version="1.0"?><svg id="a" class="b" style="c" viewBox="0 0 1 1"><path data-colorindex="0" d="M0"/></svg>"#,
        );
        assert!(out.starts_with("<svg"));
        assert!(!out.contains("id="));
        assert!(!out.contains("class="));
        assert!(!out.contains("style="));
        assert!(!out.contains("data-colorindex"));
        assert!(!out.contains("<?xml"));
        assert!(out.contains(r#"viewBox="0 0 1 1""#));
    }

    #[test]
    fn sanitize_drops_script_links() {
        let out = sanitize(
            r##"<svg viewBox="0 0 1 1"><a href=" JavaScript:alert(1)"><rect/></a><use xlink:href="java&#9;script:x()"/><use href="#shape"/></svg>"##,
        );
        assert!(!out.to_ascii_lowercase().contains("script:"), "{out}");
        assert!(out.contains("<rect"));
        assert!(out.contains(r##"href="#shape""##));
    }

    #[test]
    fn sanitize_drops_nested_foreign_object() {
        let out = sanitize(
            r#"<svg><foreignObject><div><p>x</p><br/></div></foreignObject><g><path d="M1"/></g></svg>"#,
        );
        assert!(!out.contains("foreignObject"));
        assert!(!out.contains("<div"));
        assert!(out.contains(r#"<path d="M1"/>"#));
    }

    #[test]
    fn style_recolor_keeps_protected_values() {
        let s = recolor_style("fill:red; stroke:none;opacity:0.5;stop-color:url(#g)", "#000000");
        assert_eq!(s, "fill:#000000; stroke:none;opacity:0.5;stop-color:url(#g)");
    }

    #[test]
    fn shapes_without_paint_get_fill() {
        let out = apply_color(r#"<svg><circle r="1"/><rect stroke="none"/></svg>"#, "#ABC");
        assert!(out.contains(r##"<circle r="1" fill="#aabbcc"/>"##));
        assert!(out.contains(r#"<rect stroke="none"/>"#));
        assert!(!out.starts_with(r##"<svg fill="#aabbcc""##));
    }

    #[test]
    fn invalid_target_falls_back_to_gray() {
        let out = apply_color(r#"<svg><path fill="red"/></svg>"#, "blue");
        assert!(out.contains(r##"fill="#64748b""##));
    }

    #[test]
    fn apply_color_fails_open() {
        let broken = "<svg><path></svg>";
        assert_eq!(apply_color(broken, "#ff0000"), broken);
    }

    #[test]
    fn fit_preview_derives_view_box() {
        let out = fit_preview(r#"<svg width="24px" height="16" style="x"><path d="M0"/></svg>"#)
            .unwrap();
        assert!(out.contains(r#"viewBox="0 0 24 16""#));
        assert!(!out.contains("width="));
        assert!(!out.contains("style="));
        assert!(out.contains(r#"preserveAspectRatio="xMidYMid meet""#));
        assert!(fit_preview("<html/>").is_none());
    }
}
