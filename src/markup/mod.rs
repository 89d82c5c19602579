//! Small string helpers for patching HTML without a DOM.

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let n = needle.len();
    if n == 0 {
        return Some(0);
    }
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if n > hay.len() {
        return None;
    }
    (0..=hay.len() - n).find(|&i| hay[i..i + n].eq_ignore_ascii_case(pat))
}

/// Same as [`find_ci`] but returns the last occurrence.
pub fn rfind_ci(haystack: &str, needle: &str) -> Option<usize> {
    let n = needle.len();
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if n == 0 || n > hay.len() {
        return None;
    }
    (0..=hay.len() - n).rev().find(|&i| hay[i..i + n].eq_ignore_ascii_case(pat))
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

/// Insert `snippet` on its own line before the first `</head>`; falls back to
/// right after `<head…>`, then to prepending a fresh head block.
pub fn insert_in_head(html: &str, snippet: &str) -> String {
    if let Some(idx) = find_ci(html, "</head>") {
        let mut out = String::with_capacity(html.len() + snippet.len() + 8);
        out.push_str(&html[..idx]);
        out.push_str("    ");
        out.push_str(snippet);
        out.push('\n');
        out.push_str(&html[idx..]);
        return out;
    }
    if let Some(open) = find_ci(html, "<head") {
        if let Some(rel) = html[open..].find('>') {
            let at = open + rel + 1;
            return format!("{}\n    {}{}", &html[..at], snippet, &html[at..]);
        }
    }
    format!("<head>\n    {}\n</head>\n{}", snippet, html)
}

/// Insert `snippet` before the last `</body>`, or append it.
pub fn insert_before_body_close(html: &str, snippet: &str) -> String {
    match rfind_ci(html, "</body>") {
        Some(idx) => format!("{}    {}\n{}", &html[..idx], snippet, &html[idx..]),
        None => format!("{}\n{}", html.trim_end(), snippet),
    }
}

/// Whether the page already points at `path` through an `href`/`src` attribute.
pub fn references_asset(html: &str, path: &str) -> bool {
    let trimmed = path.trim_start_matches("./");
    ["href=\"", "src=\"", "href='", "src='"].iter().any(|attr| {
        [trimmed.to_string(), format!("./{trimmed}"), format!("/{trimmed}")]
            .iter()
            .any(|p| contains_ci(html, &format!("{attr}{p}")))
    })
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
