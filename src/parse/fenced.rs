use std::sync::OnceLock;

use regex::Regex;

use super::{file_key_pattern, regex, Recovered};
use crate::wire::FilesMap;

static LABELLED_BLOCK: OnceLock<Regex> = OnceLock::new();

fn labelled_block() -> &'static Regex {
    regex(&LABELLED_BLOCK, || {
        format!(
            r"(?i)({})`?\**:?\**[ \t]*\r?\n?[ \t]*```[A-Za-z0-9_+\-]*[ \t]*\r?\n((?s:.*?))```",
            file_key_pattern()
        )
    })
}

pub(super) fn labelled_block_count(raw: &str) -> usize {
    labelled_block().captures_iter(raw).count()
}

/// Strategy 6: `filename:` followed by a fenced block, anywhere in the text.
pub(super) fn code_blocks(raw: &str) -> Option<Recovered> {
    let mut files = FilesMap::new();
    for caps in labelled_block().captures_iter(raw) {
        let (Some(name), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let name = name.as_str().trim_start_matches("./");
        if !files.contains_key(name) {
            files.insert(name.to_string(), body.as_str().trim().to_string());
        }
    }
    Recovered::files(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_markdown_decorations() {
        let raw = "### **index.html**\n```html\n<h1>x</h1>\n```\n`app.js`:\n```js\nrun();\n```";
        let got = code_blocks(raw).unwrap();
        assert_eq!(got.files["index.html"], "<h1>x</h1>");
        assert_eq!(got.files["app.js"], "run();");
    }

    #[test]
    fn unlabelled_fences_are_ignored() {
        assert!(code_blocks("```html\n<p>x</p>\n```").is_none());
        assert_eq!(labelled_block_count("```css\np{}\n```"), 0);
    }
}
