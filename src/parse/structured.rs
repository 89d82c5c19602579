use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use super::Recovered;
use crate::wire::{DeployConfig, FilesMap};

/// Strategy 1: the whole response (or its outermost `{…}` span) is a JSON
/// document with a non-empty `files` object.
pub(super) fn parse(raw: &str) -> Option<Recovered> {
    let body = strip_fence(raw.trim());
    let doc = serde_json::from_str::<Value>(body)
        .ok()
        .or_else(|| outer_object(body).and_then(|span| serde_json::from_str::<Value>(span).ok()))?;

    let entries = doc.get("files")?.as_object()?;
    let mut files = FilesMap::new();
    for (path, value) in entries {
        let content = match value {
            Value::String(s) => decode_base64(s).unwrap_or_else(|| s.clone()),
            Value::Null => continue,
            other => other.to_string(),
        };
        files.insert(path.clone(), content);
    }

    let deploy_config = doc
        .get("deploy_config")
        .and_then(|v| serde_json::from_value::<DeployConfig>(v.clone()).ok());

    let mut found = Recovered::files(files)?;
    found.deploy_config = deploy_config;
    Some(found)
}

fn outer_object(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Drops a surrounding Markdown code fence (```json … ```), if any.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => return text,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Values may come base64-encoded; only accept a decode that yields clean text.
fn decode_base64(value: &str) -> Option<String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() % 4 != 0 {
        return None;
    }
    let bytes = STANDARD.decode(compact.as_bytes()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let clean = text
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'));
    clean.then_some(text)
}
