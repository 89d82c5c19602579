//! Post-parse repairs: make sure a recovered project has a stylesheet, a
//! script, the links between them, and the deploy files a static host expects.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::markup::{contains_ci, insert_in_head, references_asset};
use crate::wire::Project;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredAsset {
    /// Substring whose presence means the asset is already loaded.
    pub marker: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnhanceConfig {
    pub min_html: usize,
    pub min_css: usize,
    pub min_js: usize,
    pub required_assets: Vec<RequiredAsset>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            min_html: 500,
            min_css: 300,
            min_js: 100,
            required_assets: vec![
                RequiredAsset {
                    marker: "fonts.googleapis.com".into(),
                    tag: r#"<link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;600;700&display=swap" rel="stylesheet">"#.into(),
                },
                RequiredAsset {
                    marker: "font-awesome".into(),
                    tag: r#"<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css">"#.into(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Repair {
    /// `appended` is true when existing content was kept ahead of the generated rules.
    GeneratedStylesheet { path: String, appended: bool },
    GeneratedScript { path: String, appended: bool },
    LinkedStylesheet { path: String },
    LinkedScript { path: String },
    InjectedAsset { marker: String },
    AddedNetlifyToml,
    AddedPackageJson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnhanceReport {
    pub repairs: Vec<Repair>,
    pub html_missing: bool,
    pub html_too_small: bool,
}

impl EnhanceReport {
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty() && !self.html_missing && !self.html_too_small
    }
}

pub const DEFAULT_NETLIFY_TOML: &str = r#"[build]
  publish = "."
  functions = "netlify/functions"

[[redirects]]
  from = "/api/*"
  to = "/.netlify/functions/:splat"
  status = 200
"#;

pub const DEFAULT_PACKAGE_JSON: &str = r#"{
  "name": "netlify-project",
  "version": "1.0.0",
  "scripts": {
    "build": "echo 'No build step required for static site'"
  },
  "dependencies": {}
}
"#;

const BASE_CSS: &str = r#"/* base layout */
*, *::before, *::after { box-sizing: border-box; }
body {
    margin: 0;
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    color: #1f2937;
    background: #ffffff;
}
img { max-width: 100%; height: auto; }
a { color: inherit; }
header, section, footer { padding: 3rem 1.5rem; }
section > * { max-width: 1100px; margin-left: auto; margin-right: auto; }
h1, h2, h3 { line-height: 1.2; margin: 0 0 1rem; }
button, .btn {
    display: inline-block;
    padding: 0.75rem 1.5rem;
    border: none;
    border-radius: 0.5rem;
    background: #2563eb;
    color: #ffffff;
    cursor: pointer;
    text-decoration: none;
}
form { display: grid; gap: 0.75rem; max-width: 560px; }
input, textarea, select { padding: 0.75rem; border: 1px solid #d1d5db; border-radius: 0.5rem; font: inherit; }
@media (max-width: 768px) {
    header, section, footer { padding: 2rem 1rem; }
}
"#;

const BASE_JS: &str = r##"// smooth scrolling for in-page links
document.querySelectorAll('a[href^="#"]').forEach((anchor) => {
    anchor.addEventListener('click', (event) => {
        const target = document.querySelector(anchor.getAttribute('href'));
        if (target) {
            event.preventDefault();
            target.scrollIntoView({ behavior: 'smooth' });
        }
    });
});
"##;

fn first_present<'a>(project: &Project, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|p| project.files.contains_key(*p))
}

/// Tops up a missing or undersized asset with generated content.
fn ensure_asset(project: &mut Project, path: &str, min_len: usize, generated: &str) -> Option<bool> {
    let existing = project.files.get(path).map(String::as_str).unwrap_or("");
    if existing.chars().count() >= min_len {
        return None;
    }
    let appended = !existing.trim().is_empty();
    let content = if appended {
        format!("{}\n\n{}", existing.trim_end(), generated)
    } else {
        generated.to_string()
    };
    project.files.insert(path.to_string(), content);
    Some(appended)
}

/// Repair `project` in place.
pub fn enhance(project: &mut Project, config: &EnhanceConfig) -> EnhanceReport {
    let mut report = EnhanceReport::default();
    let html_path = project.primary_html_path().map(str::to_string);

    let css_path = first_present(project, &["styles.css", "style.css"]).unwrap_or("styles.css");
    if let Some(appended) = ensure_asset(project, css_path, config.min_css, BASE_CSS) {
        warn!(path = css_path, appended, "stylesheet missing or too small, generated base rules");
        report.repairs.push(Repair::GeneratedStylesheet { path: css_path.to_string(), appended });
    }

    let js_path = first_present(project, &["app.js", "script.js"]).unwrap_or("app.js");
    if let Some(appended) = ensure_asset(project, js_path, config.min_js, BASE_JS) {
        warn!(path = js_path, appended, "script missing or too small, generated base script");
        report.repairs.push(Repair::GeneratedScript { path: js_path.to_string(), appended });
    }

    match html_path {
        None => {
            warn!("project has no html entry");
            report.html_missing = true;
        }
        Some(path) => {
            let mut html = project.files.get(&path).cloned().unwrap_or_default();
            if !references_asset(&html, css_path) {
                html = insert_in_head(&html, &format!(r#"<link rel="stylesheet" href="{css_path}">"#));
                report.repairs.push(Repair::LinkedStylesheet { path: css_path.to_string() });
            }
            if !references_asset(&html, js_path) {
                html = insert_in_head(&html, &format!(r#"<script src="{js_path}" defer></script>"#));
                report.repairs.push(Repair::LinkedScript { path: js_path.to_string() });
            }
            for asset in &config.required_assets {
                if !contains_ci(&html, &asset.marker) {
                    html = insert_in_head(&html, &asset.tag);
                    report.repairs.push(Repair::InjectedAsset { marker: asset.marker.clone() });
                }
            }
            report.html_too_small = html.chars().count() <= config.min_html;
            if report.html_too_small {
                warn!(path = %path, min = config.min_html, "primary html is below the size threshold");
            }
            project.files.insert(path, html);
        }
    }

    if !project.files.contains_key("netlify.toml") {
        project.files.insert("netlify.toml".into(), DEFAULT_NETLIFY_TOML.into());
        report.repairs.push(Repair::AddedNetlifyToml);
    }

    let has_jsx = project.files.keys().any(|p| p.ends_with(".jsx") || p.ends_with(".tsx"));
    if has_jsx && !project.files.contains_key("package.json") {
        project.files.insert("package.json".into(), DEFAULT_PACKAGE_JSON.into());
        report.repairs.push(Repair::AddedPackageJson);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{DeployConfig, FilesMap};

    fn project(entries: &[(&str, &str)]) -> Project {
        let files: FilesMap = entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Project::new(files, DeployConfig::default())
    }

    #[test]
    fn bare_page_gets_everything() {
        let mut p = project(&[("index.html", "<html><head><title>x</title></head><body></body></html>")]);
        let report = enhance(&mut p, &EnhanceConfig::default());
        let html = &p.files["index.html"];
        assert!(html.contains(r#"<link rel="stylesheet" href="styles.css">"#));
        assert!(html.contains(r#"<script src="app.js" defer></script>"#));
        assert!(html.contains("fonts.googleapis.com"));
        assert!(html.contains("font-awesome"));
        let head_end = html.find("</head>").unwrap();
        assert!(html.find("app.js").unwrap() < head_end);
        assert!(p.files["styles.css"].len() >= 300);
        assert!(p.files["app.js"].len() >= 100);
        assert_eq!(p.files["netlify.toml"], DEFAULT_NETLIFY_TOML);
        assert!(report.html_too_small);
        assert!(!report.html_missing);
    }

    #[test]
    fn small_stylesheet_is_kept_and_extended() {
        let mut p = project(&[("index.html", "<head></head>"), ("style.css", ".brand { color: red; }")]);
        let report = enhance(&mut p, &EnhanceConfig::default());
        let css = &p.files["style.css"];
        assert!(css.starts_with(".brand { color: red; }"));
        assert!(css.contains("/* base layout */"));
        assert!(!p.files.contains_key("styles.css"));
        assert!(report
            .repairs
            .contains(&Repair::GeneratedStylesheet { path: "style.css".into(), appended: true }));
        assert!(p.files["index.html"].contains(r#"href="style.css""#));
    }

    #[test]
    fn missing_html_is_reported_not_invented() {
        let mut p = project(&[("styles.css", "body {}")]);
        let report = enhance(&mut p, &EnhanceConfig::default());
        assert!(report.html_missing);
        assert!(p.primary_html_path().is_none());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut p = project(&[("index.html", "<p>hi</p>")]);
        enhance(&mut p, &EnhanceConfig::default());
        let before = p.clone();
        let report = enhance(&mut p, &EnhanceConfig::default());
        assert!(report.repairs.is_empty());
        assert_eq!(p, before);
    }

    #[test]
    fn head_block_is_created_when_absent() {
        let mut p = project(&[("index.html", "<body>content</body>")]);
        enhance(&mut p, &EnhanceConfig::default());
        assert!(p.files["index.html"].starts_with("<head>"));
    }

    #[test]
    fn jsx_sources_get_a_package_manifest() {
        let mut p = project(&[("index.html", "<head></head>"), ("src/App.jsx", "export default 1")]);
        let report = enhance(&mut p, &EnhanceConfig::default());
        assert!(report.repairs.contains(&Repair::AddedPackageJson));
        assert!(serde_json::from_str::<serde_json::Value>(&p.files["package.json"]).is_ok());
    }

    #[test]
    fn existing_references_are_respected() {
        let html = format!(
            r#"<html><head><link rel="stylesheet" href="./styles.css"><script src="/app.js"></script>{}</head><body>{}</body></html>"#,
            r#"<link href="https://fonts.googleapis.com/css2?family=Inter" rel="stylesheet"><link rel="stylesheet" href="https://cdn/font-awesome.css">"#,
            "x".repeat(600)
        );
        let (css, js) = ("a".repeat(400), "b".repeat(200));
        let mut p = project(&[
            ("index.html", html.as_str()),
            ("styles.css", css.as_str()),
            ("app.js", js.as_str()),
            ("netlify.toml", "[build]"),
        ]);
        let report = enhance(&mut p, &EnhanceConfig::default());
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(p.files["index.html"], html);
    }
}
