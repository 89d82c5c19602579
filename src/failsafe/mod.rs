//! Offline site synthesis: when no backend produced a usable project, build
//! a complete business landing page from the prompt and its classification.

use chrono::{Datelike, Utc};
use tracing::info;

use crate::classify::{classify, extract_business_name, extract_location, Catalog, Classification};
use crate::enhance::DEFAULT_NETLIFY_TOML;
use crate::markup::escape_html;
use crate::wire::{DeployConfig, FilesMap, Project};

const FALLBACK_SERVICES: &[&str] = &["Our Services", "About Us", "Get in Touch"];
const FALLBACK_TAGLINE: &str = "Quality service you can count on";
const SUMMARY_CHARS: usize = 240;

/// Classify `prompt` against the embedded catalog, then synthesize.
pub fn rescue(prompt: &str) -> Project {
    synthesize(prompt, &classify(prompt), Catalog::embedded())
}

pub fn synthesize(prompt: &str, classification: &Classification, catalog: &Catalog) -> Project {
    let page = Page::new(prompt, classification, catalog);
    info!(
        category = %classification.category,
        confidence = classification.confidence,
        "synthesizing offline site"
    );

    let mut files = FilesMap::new();
    files.insert("index.html".into(), page.html());
    files.insert("styles.css".into(), stylesheet(&page.accent));
    files.insert("app.js".into(), SCRIPT.to_string());
    files.insert("netlify.toml".into(), DEFAULT_NETLIFY_TOML.to_string());
    files.insert("README.md".into(), page.readme());
    Project::new(files, DeployConfig::default())
}

/// Everything the templates interpolate, already escaped.
struct Page {
    name: String,
    label: String,
    tagline: String,
    summary: String,
    services: Vec<String>,
    location: Option<String>,
    accent: String,
    year: i32,
}

impl Page {
    fn new(prompt: &str, classification: &Classification, catalog: &Catalog) -> Self {
        let label = classification.label.clone();
        let name = extract_business_name(prompt).unwrap_or_else(|| label.clone());

        let mut services = catalog.services_for(&classification.category);
        if services.is_empty() {
            services = FALLBACK_SERVICES.iter().map(|s| s.to_string()).collect();
        }

        let prompt = prompt.trim();
        let summary = if prompt.is_empty() {
            format!("Welcome to {name}. We are glad you are here.")
        } else {
            truncate_chars(prompt, SUMMARY_CHARS)
        };

        Self {
            tagline: escape_html(catalog.tagline_for(&classification.category).unwrap_or(FALLBACK_TAGLINE)),
            accent: sanitize_color(catalog.accent_for(&classification.category)),
            name: escape_html(&name),
            label: escape_html(&label),
            summary: escape_html(&summary),
            services: services.iter().map(|s| escape_html(s)).collect(),
            location: extract_location(prompt).map(|l| escape_html(&l)),
            year: Utc::now().year(),
        }
    }

    fn service_cards(&self) -> String {
        self.services
            .iter()
            .map(|s| {
                format!(
                    r#"                <article class="card">
                    <i class="fa-solid fa-circle-check" aria-hidden="true"></i>
                    <h3>{s}</h3>
                    <p>Ask us how {s} can work for you.</p>
                </article>"#
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn html(&self) -> String {
        let Page { name, label, tagline, summary, year, .. } = self;
        let cards = self.service_cards();
        let (hero_location, footer_location) = match &self.location {
            Some(place) => (
                format!(
                    "\n        <p class=\"location\"><i class=\"fa-solid fa-location-dot\" aria-hidden=\"true\"></i> {place}</p>"
                ),
                format!(", {place}"),
            ),
            None => (String::new(), String::new()),
        };
        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="description" content="{name} | {label}">
    <title>{name}</title>
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;600;700&display=swap" rel="stylesheet">
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css">
    <link rel="stylesheet" href="styles.css">
    <script src="app.js" defer></script>
</head>
<body>
    <nav class="nav">
        <a class="brand" href="#home">{name}</a>
        <button class="nav-toggle" aria-label="Toggle navigation" aria-expanded="false"><i class="fa-solid fa-bars"></i></button>
        <ul class="nav-links">
            <li><a href="#services">Services</a></li>
            <li><a href="#about">About</a></li>
            <li><a href="#contact">Contact</a></li>
        </ul>
    </nav>

    <header id="home" class="hero">
        <h1>{name}</h1>
        <p class="tagline">{tagline}</p>{hero_location}
        <a class="btn" href="#contact">Get in touch</a>
    </header>

    <main>
        <section id="services" class="services">
            <h2>What we offer</h2>
            <div class="grid">
{cards}
            </div>
        </section>

        <section id="about" class="about">
            <h2>About {name}</h2>
            <p>{summary}</p>
        </section>

        <section id="contact" class="contact">
            <h2>Contact us</h2>
            <form id="contact-form" class="contact-form">
                <label>Name <input type="text" name="name" required></label>
                <label>Email <input type="email" name="email" required></label>
                <label>Message <textarea name="message" rows="5" required></textarea></label>
                <button type="submit" class="btn">Send message</button>
                <p class="form-status" role="status"></p>
            </form>
        </section>
    </main>

    <footer class="footer">
        <p>&copy; {year} {name}{footer_location}. All rights reserved.</p>
    </footer>
</body>
</html>
"##
        )
    }

    fn readme(&self) -> String {
        format!(
            "# {}\n\nStatic {} site, ready for Netlify.\n\n## Files\n\n- `index.html`\n- `styles.css`\n- `app.js`\n- `netlify.toml`\n\n## Deploy\n\nDrag this folder into Netlify, or run `netlify deploy --dir .`.\n",
            self.name, self.label
        )
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Only `#rgb`/`#rrggbb` colours reach the stylesheet.
fn sanitize_color(color: &str) -> String {
    let hex = color.strip_prefix('#').unwrap_or("");
    let ok = matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        color.to_string()
    } else {
        "#2563eb".to_string()
    }
}

fn stylesheet(accent: &str) -> String {
    format!(
        r#":root {{
    --accent: {accent};
    --text: #1f2937;
    --muted: #6b7280;
    --surface: #f9fafb;
}}

*, *::before, *::after {{ box-sizing: border-box; }}

body {{
    margin: 0;
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    color: var(--text);
    line-height: 1.6;
}}

.nav {{
    position: sticky;
    top: 0;
    display: flex;
    align-items: center;
    justify-content: space-between;
    padding: 1rem 1.5rem;
    background: #ffffff;
    box-shadow: 0 1px 4px rgba(0, 0, 0, 0.08);
    z-index: 10;
}}
.brand {{ font-weight: 700; color: var(--accent); text-decoration: none; }}
.nav-links {{ display: flex; gap: 1.5rem; list-style: none; margin: 0; padding: 0; }}
.nav-links a {{ color: var(--text); text-decoration: none; }}
.nav-toggle {{ display: none; background: none; border: none; font-size: 1.25rem; cursor: pointer; }}

.hero {{
    padding: 6rem 1.5rem;
    text-align: center;
    color: #ffffff;
    background: linear-gradient(135deg, var(--accent), #111827);
}}
.hero h1 {{ font-size: 3rem; margin: 0 0 0.5rem; }}
.tagline {{ font-size: 1.25rem; opacity: 0.9; }}
.location {{ margin-top: 0.5rem; opacity: 0.85; }}

section {{ padding: 4rem 1.5rem; max-width: 1100px; margin: 0 auto; }}
.grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); gap: 1.5rem; }}
.card {{ background: var(--surface); padding: 1.5rem; border-radius: 0.75rem; }}
.card i {{ color: var(--accent); font-size: 1.5rem; }}

.btn {{
    display: inline-block;
    padding: 0.75rem 1.5rem;
    border: none;
    border-radius: 0.5rem;
    background: var(--accent);
    color: #ffffff;
    text-decoration: none;
    cursor: pointer;
}}
.hero .btn {{ background: #ffffff; color: var(--accent); }}

.contact-form {{ display: grid; gap: 1rem; max-width: 560px; }}
.contact-form label {{ display: grid; gap: 0.25rem; font-weight: 600; }}
.contact-form input, .contact-form textarea {{
    padding: 0.75rem;
    border: 1px solid #d1d5db;
    border-radius: 0.5rem;
    font: inherit;
}}
.form-status {{ color: var(--muted); min-height: 1.5rem; }}

.footer {{ padding: 2rem 1.5rem; text-align: center; color: var(--muted); background: var(--surface); }}

@media (max-width: 768px) {{
    .nav-toggle {{ display: block; }}
    .nav-links {{ display: none; position: absolute; top: 100%; left: 0; right: 0; flex-direction: column; padding: 1rem 1.5rem; background: #ffffff; }}
    .nav-links.open {{ display: flex; }}
    .hero h1 {{ font-size: 2rem; }}
}}
"#
    )
}

const SCRIPT: &str = r##"document.addEventListener('DOMContentLoaded', () => {
    const toggle = document.querySelector('.nav-toggle');
    const links = document.querySelector('.nav-links');
    if (toggle && links) {
        toggle.addEventListener('click', () => {
            const open = links.classList.toggle('open');
            toggle.setAttribute('aria-expanded', String(open));
        });
    }

    document.querySelectorAll('a[href^="#"]').forEach((anchor) => {
        anchor.addEventListener('click', (event) => {
            const target = document.querySelector(anchor.getAttribute('href'));
            if (target) {
                event.preventDefault();
                target.scrollIntoView({ behavior: 'smooth' });
                if (links) links.classList.remove('open');
            }
        });
    });

    const form = document.getElementById('contact-form');
    if (form) {
        form.addEventListener('submit', (event) => {
            event.preventDefault();
            const status = form.querySelector('.form-status');
            if (status) status.textContent = 'Thanks! We will get back to you shortly.';
            form.reset();
        });
    }
});
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::{enhance, EnhanceConfig};
    use proptest::prelude::*;

    #[test]
    fn law_firm_site_uses_category_services() {
        let project = rescue("Create a law firm website with practice areas, attorney bios, and a contact form");
        let html = &project.files["index.html"];
        assert!(html.contains("Practice Areas"));
        assert!(html.contains("id=\"contact-form\""));
        assert!(project.files["styles.css"].contains("#1e3a8a"));
        assert!(project.is_valid(500));
        for path in ["index.html", "styles.css", "app.js", "netlify.toml", "README.md"] {
            assert!(project.files.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn empty_prompt_still_builds_a_site() {
        let project = rescue("");
        assert!(project.is_valid(500));
        assert!(project.files["index.html"].contains("<h1>Business</h1>"));
    }

    #[test]
    fn prompt_text_is_escaped() {
        let project = rescue("site for \"<script>alert(1)</script>\" & co");
        let html = &project.files["index.html"];
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn passes_enhancement_without_repairs_to_assets() {
        let mut project = rescue("A cozy bakery called Sweet Crumbs");
        assert!(project.files["index.html"].contains("Sweet Crumbs"));
        let report = enhance(&mut project, &EnhanceConfig::default());
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn location_reaches_hero_and_footer() {
        let project = rescue("A cozy bakery called Sweet Crumbs in Portland");
        let html = &project.files["index.html"];
        assert!(html.contains("fa-location-dot\" aria-hidden=\"true\"></i> Portland</p>"));
        assert!(html.contains("Sweet Crumbs, Portland. All rights reserved."));

        let plain = rescue("A cozy bakery called Sweet Crumbs");
        assert!(!plain.files["index.html"].contains("class=\"location\""));
    }

    #[test]
    fn bad_accent_is_replaced() {
        assert_eq!(sanitize_color("#abc"), "#abc");
        assert_eq!(sanitize_color("red;} body{display:none"), "#2563eb");
    }

    #[test]
    fn long_prompts_are_summarised() {
        let prompt = "word ".repeat(200);
        let project = rescue(&prompt);
        assert!(project.files["index.html"].contains('…'));
    }

    proptest! {
        #[test]
        fn any_prompt_yields_a_valid_project(prompt in ".{0,300}") {
            let project = rescue(&prompt);
            prop_assert!(project.is_valid(500));
            prop_assert!(!project.files["app.js"].is_empty());
        }
    }
}
