//! Recovers a `{path → content}` map from whatever the backend sent back.
//!
//! The cascade is an ordered list of pure strategies. The first one that
//! yields an HTML entry wins; entries recovered earlier by strategies that
//! found no page are merged into its result. Nothing here holds state, so
//! running the cascade twice on the same text gives the same answer.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::errors::ParseFailure;
use crate::wire::{is_html_path, DeployConfig, FilesMap};

mod embedded;
mod fenced;
mod keyed;
mod structured;

pub use embedded::{has_inline_assets, promote_document, Promoted};

/// Extensions a key must end with to be treated as a project file.
pub(crate) const FILE_EXTENSIONS: &str = "html|htm|css|js|mjs|json|toml|md|txt|svg|xml";

pub(crate) fn file_key_pattern() -> String {
    format!(r"[A-Za-z0-9_\-./]+\.(?:{FILE_EXTENSIONS})")
}

pub(crate) fn regex(cell: &'static OnceLock<Regex>, pattern: impl FnOnce() -> String) -> &'static Regex {
    cell.get_or_init(|| Regex::new(&pattern()).expect("static regex is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Structured,
    FieldAnchored,
    GenericKeyed,
    UnquotedRaw,
    EmbeddedAssets,
    CodeBlocks,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Structured => "structured",
            Strategy::FieldAnchored => "field-anchored",
            Strategy::GenericKeyed => "generic-keyed",
            Strategy::UnquotedRaw => "unquoted-raw",
            Strategy::EmbeddedAssets => "embedded-assets",
            Strategy::CodeBlocks => "code-blocks",
        };
        f.write_str(name)
    }
}

/// What a single strategy managed to pull out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    pub files: FilesMap,
    pub deploy_config: Option<DeployConfig>,
}

impl Recovered {
    pub(crate) fn files(files: FilesMap) -> Option<Self> {
        if files.is_empty() {
            None
        } else {
            Some(Self { files, deploy_config: None })
        }
    }
}

/// Cascade output: the files plus which strategy produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub files: FilesMap,
    pub deploy_config: Option<DeployConfig>,
    pub strategy: Strategy,
}

type StrategyFn = fn(&str) -> Option<Recovered>;

const STRATEGIES: &[(Strategy, StrategyFn)] = &[
    (Strategy::Structured, structured::parse),
    (Strategy::FieldAnchored, keyed::field_anchored),
    (Strategy::GenericKeyed, keyed::generic),
    (Strategy::UnquotedRaw, keyed::unquoted),
    (Strategy::EmbeddedAssets, embedded::single_document),
    (Strategy::CodeBlocks, fenced::code_blocks),
];

/// Run a single strategy by name; blank entries are dropped.
pub fn run_strategy(strategy: Strategy, raw: &str) -> Option<Recovered> {
    let (_, run) = STRATEGIES.iter().find(|(s, _)| *s == strategy)?;
    let mut found = run(raw)?;
    found.files.retain(|_, content| !content.trim().is_empty());
    if found.files.is_empty() {
        None
    } else {
        Some(found)
    }
}

pub fn parse_response(raw: &str) -> Result<Extracted, ParseFailure> {
    // files from strategies that found no page, and who found them first
    let mut partial: Option<(Strategy, Recovered)> = None;
    for (strategy, _) in STRATEGIES {
        let Some(found) = run_strategy(*strategy, raw) else {
            debug!(%strategy, "strategy recovered nothing");
            continue;
        };
        if !found.files.keys().any(|k| is_html_path(k)) {
            debug!(%strategy, files = found.files.len(), "strategy recovered no page, continuing");
            partial = Some(match partial {
                Some((first, acc)) => (first, merge_partial(found, acc)),
                None => (*strategy, found),
            });
            continue;
        }
        debug!(%strategy, files = found.files.len(), "strategy recovered files");
        let found = match partial {
            Some((_, acc)) => merge_partial(found, acc),
            None => found,
        };
        return Ok(Extracted {
            files: normalize_single_document(found.files),
            deploy_config: found.deploy_config,
            strategy: *strategy,
        });
    }
    // no page anywhere; an edit may still legitimately return only assets
    if let Some((strategy, found)) = partial {
        return Ok(Extracted {
            files: found.files,
            deploy_config: found.deploy_config,
            strategy,
        });
    }
    Err(ParseFailure {
        response_len: raw.len(),
        strategies_tried: STRATEGIES.len(),
    })
}

/// Lay `earlier` over `later`. Earlier strategies read properly quoted
/// values, so their content wins for keys both recovered.
fn merge_partial(later: Recovered, earlier: Recovered) -> Recovered {
    let mut files = later.files;
    for (path, content) in earlier.files {
        files.insert(path, content);
    }
    Recovered {
        files,
        deploy_config: earlier.deploy_config.or(later.deploy_config),
    }
}

/// A lone HTML page carrying inline `<style>`/`<script>` is split into the
/// usual three files.
fn normalize_single_document(files: FilesMap) -> FilesMap {
    if files.len() != 1 {
        return files;
    }
    let Some((path, html)) = files.first() else {
        return files;
    };
    if !is_html_path(path) || !has_inline_assets(html) {
        return files;
    }
    let promoted = promote_document(html);
    let mut out = FilesMap::new();
    out.insert(path.clone(), promoted.html);
    out.insert("styles.css".into(), promoted.css);
    out.insert("app.js".into(), promoted.js);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::Strategy;

    #[test]
    fn well_formed_json_is_taken_directly() {
        let raw = r#"{"files": {"index.html": "<html><body>hi</body></html>", "styles.css": "body { color: red; }"}}"#;
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::Structured);
        assert_eq!(got.files["styles.css"], "body { color: red; }");
    }

    #[test]
    fn escaped_quotes_survive_the_cascade() {
        let raw = r#"{"files": {"index.html": "<html>\"quoted\" text</html>"}}"#;
        let got = parse_response(raw).unwrap();
        assert_eq!(got.files["index.html"], r#"<html>"quoted" text</html>"#);
        assert!(got.files["index.html"].contains(r#""quoted""#));
    }

    #[test]
    fn control_characters_fall_through_to_scanner() {
        // literal newlines inside a JSON string make it invalid JSON
        let raw = "{\"files\": {\"index.html\": \"<html>\n<p class=\\\"x\\\">hi</p>\n</html>\", \"app.js\": \"let a = 1;\"}}";
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::FieldAnchored);
        assert_eq!(got.files["index.html"], "<html>\n<p class=\"x\">hi</p>\n</html>");
        assert_eq!(got.files["app.js"], "let a = 1;");
    }

    #[test]
    fn unknown_filenames_use_generic_extraction() {
        let raw = "{\"pages\": {\"about/team.html\": \"<h1>Team</h1>\n\", \"theme.css\": \"h1{}\"}}";
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::GenericKeyed);
        assert_eq!(got.files.keys().collect::<Vec<_>>(), vec!["about/team.html", "theme.css"]);
    }

    #[test]
    fn unquoted_markup_values_are_recovered() {
        let raw = "{\"files\": {\"index.html\": <!DOCTYPE html><html><body>Hi</body></html>,\n\"styles.css\": body { margin: 0; }\n}}";
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::UnquotedRaw);
        assert_eq!(got.files["index.html"], "<!DOCTYPE html><html><body>Hi</body></html>");
        assert_eq!(got.files["styles.css"], "body { margin: 0; }");
    }

    #[test]
    fn mixed_quoting_keeps_looking_for_the_page() {
        let page = format!(
            "<!DOCTYPE html><html><body><h1>Crumbs</h1><p>{}</p></body></html>",
            "Fresh bread daily. ".repeat(40)
        );
        let raw = format!("{{\"files\": {{\"index.html\": {page},\n\"styles.css\": \"body {{ margin: 0; }}\"}}}}");

        let anchored = run_strategy(Strategy::FieldAnchored, &raw).unwrap();
        assert_eq!(anchored.files.keys().collect::<Vec<_>>(), vec!["styles.css"]);

        let got = parse_response(&raw).unwrap();
        assert_eq!(got.strategy, Strategy::UnquotedRaw);
        assert_eq!(got.files["index.html"], page);
        assert_eq!(got.files["styles.css"], "body { margin: 0; }");
    }

    #[test]
    fn quoted_value_wins_over_unquoted_reading_of_same_key() {
        let earlier = Recovered::files(FilesMap::from_iter([("styles.css".to_string(), "a{}".to_string())])).unwrap();
        let later = Recovered::files(FilesMap::from_iter([
            ("index.html".to_string(), "<html></html>".to_string()),
            ("styles.css".to_string(), "\"a{}\"}}".to_string()),
        ]))
        .unwrap();
        let merged = merge_partial(later, earlier);
        assert_eq!(merged.files["styles.css"], "a{}");
        assert_eq!(merged.files["index.html"], "<html></html>");
    }

    #[test]
    fn assets_without_a_page_are_still_returned() {
        let raw = r#"{"files": {"styles.css": "h1 { color: teal; }"}}"#;
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::Structured);
        assert_eq!(got.files.keys().collect::<Vec<_>>(), vec!["styles.css"]);
    }

    #[test]
    fn bare_html_document_is_promoted_to_three_files() {
        let raw = "Here you go:\n<!DOCTYPE html>\n<html><head><style>body{color:red}</style></head>\n<body><p>Hi</p><script>console.log('x')</script></body></html>\nEnjoy!";
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::EmbeddedAssets);
        assert_eq!(got.files.len(), 3);
        assert_eq!(got.files["styles.css"], "body{color:red}");
        assert_eq!(got.files["app.js"], "console.log('x')");
        let html = &got.files["index.html"];
        assert!(!html.contains("<style"));
        assert!(html.contains(r#"href="styles.css""#));
        assert!(html.contains(r#"src="app.js""#));
    }

    #[test]
    fn labelled_fences_are_the_last_resort() {
        let raw = "index.html:\n```html\n<h1>Hello</h1>\n```\n\nstyles.css:\n```css\nh1 { color: blue; }\n```\n";
        let got = parse_response(raw).unwrap();
        assert_eq!(got.strategy, Strategy::CodeBlocks);
        assert_eq!(got.files["index.html"], "<h1>Hello</h1>");
        assert_eq!(got.files["styles.css"], "h1 { color: blue; }");
    }

    #[test]
    fn single_json_page_with_inline_assets_is_normalized() {
        let raw = r#"{"files": {"index.html": "<html><head><style>p{}</style></head><body></body></html>"}}"#;
        let got = parse_response(raw).unwrap();
        assert_eq!(got.files.len(), 3);
        assert_eq!(got.files["styles.css"], "p{}");
    }

    #[test]
    fn garbage_is_a_definitive_failure() {
        let err = parse_response("I'm sorry, I can't help with that.").unwrap_err();
        assert_eq!(err.strategies_tried, 6);
        assert!(parse_response("").is_err());
        assert!(parse_response(r#"{"files": {}}"#).is_err());
    }

    proptest! {
        #[test]
        fn structured_round_trip(entries in proptest::collection::btree_map(
            "[a-z]{1,8}\\.(html|css|js)",
            "<[a-z]{1,5}>[ -~]{0,40}",
            1..5,
        )) {
            let mut files = FilesMap::new();
            for (k, v) in &entries {
                files.insert(k.clone(), v.clone());
            }
            let raw = serde_json::json!({ "files": files }).to_string();
            let got = run_strategy(Strategy::Structured, &raw).unwrap();
            let expected: FilesMap = files.into_iter().filter(|(_, v)| !v.trim().is_empty()).collect();
            prop_assert_eq!(got.files, expected);
        }

        #[test]
        fn cascade_is_idempotent(raw in "[ -~\n]{0,200}") {
            prop_assert_eq!(parse_response(&raw), parse_response(&raw));
        }
    }
}
