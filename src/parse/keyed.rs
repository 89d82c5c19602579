use std::sync::OnceLock;

use regex::Regex;

use super::{file_key_pattern, regex, Recovered};
use crate::scan::{extract_quoted, find_closing_quote, unescape, value_start_after_key};
use crate::wire::FilesMap;

/// Filenames the generation prompt asks for.
const EXPECTED_FILES: &[&str] = &[
    "index.html",
    "styles.css",
    "style.css",
    "app.js",
    "script.js",
    "netlify.toml",
    "package.json",
    "README.md",
];

/// Strategy 2: anchor on `"files"`, then pull each expected filename's value
/// with the escape-aware scanner.
pub(super) fn field_anchored(raw: &str) -> Option<Recovered> {
    let anchor = raw.find("\"files\"")?;
    let mut files = FilesMap::new();
    for name in EXPECTED_FILES {
        let key = format!("\"{name}\"");
        let mut from = anchor;
        while let Some(rel) = raw[from..].find(&key) {
            let after_key = from + rel + key.len();
            if let Some(start) = value_start_after_key(raw, after_key) {
                if let Some((value, _)) = extract_quoted(raw, start) {
                    files.insert((*name).to_string(), value.into_owned());
                }
                break;
            }
            from = after_key;
        }
    }
    Recovered::files(files)
}

static GENERIC_KEY: OnceLock<Regex> = OnceLock::new();

/// Strategy 3: any `"<path>.<ext>": "` pair, wherever it sits.
pub(super) fn generic(raw: &str) -> Option<Recovered> {
    let re = regex(&GENERIC_KEY, || format!(r#""({})"\s*:\s*""#, file_key_pattern()));
    let mut files = FilesMap::new();
    let mut pos = 0;
    while let Some(caps) = re.captures_at(raw, pos) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let start = whole.end();
        let Some(end) = find_closing_quote(raw, start) else {
            // nothing after this point can be a terminated value
            break;
        };
        if !files.contains_key(key.as_str()) {
            files.insert(key.as_str().to_string(), unescape(&raw[start..end]).into_owned());
        }
        pos = end + 1;
    }
    Recovered::files(files)
}

static ANY_KEY: OnceLock<Regex> = OnceLock::new();

struct KeyHit<'a> {
    name: &'a str,
    token_start: usize,
    value_start: usize,
}

/// Strategy 4: `key: <raw markup>` without quotes. Content runs to the next
/// recognised key, or to the end of the object for the last one.
pub(super) fn unquoted(raw: &str) -> Option<Recovered> {
    let re = regex(&ANY_KEY, || {
        format!(r#"(?:^|[\s{{,])("?)({})"?\s*:[ \t]*"#, file_key_pattern())
    });
    let hits: Vec<KeyHit<'_>> = re
        .captures_iter(raw)
        .filter_map(|caps| {
            Some(KeyHit {
                name: caps.get(2)?.as_str(),
                token_start: caps.get(1)?.start(),
                value_start: caps.get(0)?.end(),
            })
        })
        .collect();

    let mut files = FilesMap::new();
    for (i, hit) in hits.iter().enumerate() {
        let is_last = i + 1 == hits.len();
        let boundary = hits.get(i + 1).map(|h| h.token_start).unwrap_or(raw.len());
        if hit.value_start > boundary || files.contains_key(hit.name) {
            continue;
        }
        let span = &raw[hit.value_start..boundary];
        let content = if let Some(quoted) = span.strip_prefix('"') {
            // quoted but never terminated (truncated output)
            match find_closing_quote(raw, hit.value_start + 1) {
                Some(end) if end < boundary => continue,
                _ => unescape(trim_value_tail(quoted, is_last)).into_owned(),
            }
        } else {
            let value = trim_value_tail(span, is_last);
            if value.starts_with("```") || value.starts_with('{') {
                continue;
            }
            value.to_string()
        };
        if !content.trim().is_empty() {
            files.insert(hit.name.to_string(), content);
        }
    }
    Recovered::files(files)
}

/// Strip separators left between entries; for the last entry also drop the
/// closing braces of the enclosing object(s) that are not part of the value.
fn trim_value_tail(span: &str, is_last: bool) -> &str {
    let mut value = span.trim();
    value = value.strip_suffix(',').unwrap_or(value).trim_end();
    if is_last {
        loop {
            let opens = value.matches('{').count();
            let closes = value.matches('}').count();
            match value.strip_suffix('}') {
                Some(rest) if closes > opens => value = rest.trim_end(),
                _ => break,
            }
        }
    }
    value.strip_suffix(',').unwrap_or(value).trim()
}
