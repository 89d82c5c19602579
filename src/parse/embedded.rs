use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::{fenced, regex, Recovered};
use crate::markup::{find_ci, insert_before_body_close, insert_in_head, rfind_ci};
use crate::scan::unescape;
use crate::wire::FilesMap;

static HTML_FENCE: OnceLock<Regex> = OnceLock::new();
static ANY_FENCE: OnceLock<Regex> = OnceLock::new();
static STYLE_BLOCK: OnceLock<Regex> = OnceLock::new();
static SCRIPT_BLOCK: OnceLock<Regex> = OnceLock::new();

/// A page split into markup, stylesheet and script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promoted {
    pub html: String,
    pub css: String,
    pub js: String,
}

/// Strategy 5: the backend answered with one bare HTML document.
pub(super) fn single_document(raw: &str) -> Option<Recovered> {
    if fenced::labelled_block_count(raw) >= 2 {
        return None;
    }
    let html = locate_document(raw)?;
    let html = if html.contains("\\n") && !html.contains('\n') {
        // the page is still JSON-escaped
        unescape(&html).into_owned()
    } else {
        html
    };
    let promoted = promote_document(&html);
    let mut files = FilesMap::new();
    files.insert("index.html".into(), promoted.html);
    files.insert("styles.css".into(), promoted.css);
    files.insert("app.js".into(), promoted.js);
    Recovered::files(files)
}

fn locate_document(raw: &str) -> Option<String> {
    let html_fence = regex(&HTML_FENCE, || r"(?is)```html[ \t]*\r?\n(.*?)```".to_string());
    if let Some(body) = html_fence.captures(raw).and_then(|c| c.get(1)) {
        let body = body.as_str().trim();
        if body.contains('<') {
            return Some(body.to_string());
        }
    }

    let any_fence = regex(&ANY_FENCE, || r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```".to_string());
    for caps in any_fence.captures_iter(raw) {
        let Some(body) = caps.get(1) else { continue };
        let body = body.as_str().trim();
        if find_ci(body, "<!doctype").is_some() || find_ci(body, "<html").is_some() {
            return Some(body.to_string());
        }
    }

    let start = find_ci(raw, "<!doctype").or_else(|| find_ci(raw, "<html"))?;
    let end = rfind_ci(raw, "</html>").map(|i| i + "</html>".len());
    let span = match end {
        Some(end) if end > start => &raw[start..end],
        // no closing tag: take the rest (truncated output)
        _ => &raw[start..],
    };
    Some(span.trim().to_string())
}

pub fn has_inline_assets(html: &str) -> bool {
    style_block().is_match(html) || script_block().captures_iter(html).any(|c| is_inline_script(&c))
}

fn style_block() -> &'static Regex {
    regex(&STYLE_BLOCK, || r"(?is)<style[^>]*>(.*?)</style>".to_string())
}

fn script_block() -> &'static Regex {
    regex(&SCRIPT_BLOCK, || r"(?is)<script([^>]*)>(.*?)</script>".to_string())
}

fn is_inline_script(caps: &Captures<'_>) -> bool {
    let attrs = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
    !attrs.contains("src=") && !attrs.contains("json") && !attrs.contains("template")
}

/// Move inline `<style>` and inline `<script>` bodies out of `html` and
/// reference `styles.css` / `app.js` instead. External scripts stay put.
pub fn promote_document(html: &str) -> Promoted {
    let mut css_parts = Vec::new();
    let without_styles = style_block().replace_all(html, |caps: &Captures<'_>| {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if !body.is_empty() {
                css_parts.push(body.to_string());
            }
        }
        String::new()
    });

    let mut js_parts = Vec::new();
    let without_scripts = script_block().replace_all(&without_styles, |caps: &Captures<'_>| {
        if !is_inline_script(caps) {
            return caps[0].to_string();
        }
        if let Some(body) = caps.get(2) {
            let body = body.as_str().trim();
            if !body.is_empty() {
                js_parts.push(body.to_string());
            }
        }
        String::new()
    });

    let mut page = without_scripts.into_owned();
    if !crate::markup::references_asset(&page, "styles.css") {
        page = insert_in_head(&page, r#"<link rel="stylesheet" href="styles.css">"#);
    }
    if !crate::markup::references_asset(&page, "app.js") {
        page = insert_before_body_close(&page, r#"<script src="app.js"></script>"#);
    }

    Promoted {
        html: page,
        css: css_parts.join("\n\n"),
        js: js_parts.join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_html_fence() {
        let raw = "```html\n<html><body>A</body></html>\n```\nand <html>B</html>";
        let got = single_document(raw).unwrap();
        assert!(got.files["index.html"].contains("<body>A</body>"));
    }

    #[test]
    fn keeps_external_and_data_scripts() {
        let html = r#"<html><head><script src="https://cdn.x/y.js"></script></head><body><script type="application/ld+json">{"a":1}</script><script>go()</script></body></html>"#;
        let promoted = promote_document(html);
        assert_eq!(promoted.js, "go()");
        assert!(promoted.html.contains("cdn.x/y.js"));
        assert!(promoted.html.contains("ld+json"));
        assert!(!promoted.html.contains("go()"));
    }

    #[test]
    fn joins_multiple_style_blocks() {
        let promoted = promote_document("<head><style>a{}</style><STYLE media=\"print\">b{}</STYLE></head><body></body>");
        assert_eq!(promoted.css, "a{}\n\nb{}");
        assert_eq!(promoted.html.matches("styles.css").count(), 1);
    }

    #[test]
    fn unescapes_json_escaped_page() {
        let raw = r#"{"files": {"index.html": "<!DOCTYPE html>\n<html><body class=\"x\">Hi</body></html>"#;
        let got = single_document(raw).unwrap();
        assert!(got.files["index.html"].contains("<body class=\"x\">Hi</body>"));
    }

    #[test]
    fn declines_without_markup() {
        assert!(single_document("just words").is_none());
    }
}
