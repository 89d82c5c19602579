//! Keyword classifier that maps a free-text prompt onto a business category.
//!
//! The catalog lives in `data/catalog.yaml` and is compiled into the binary.
//! Scoring: every keyword found in the prompt (case-insensitive, whole words)
//! adds `2 × words_in_keyword`. The best total wins; ties go to the entry that
//! appears first in the catalog.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const EMBEDDED_CATALOG: &str = include_str!("../../data/catalog.yaml");

const DEFAULT_CONFIDENCE: f64 = 0.3;
const DEFAULT_ACCENT: &str = "#2563eb";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Family {
    pub tagline: String,
    pub accent: String,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub label: String,
    pub family: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Catalog {
    pub default_category: String,
    #[serde(default)]
    pub families: IndexMap<String, Family>,
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// The compiled-in catalog, parsed on first use.
    pub fn embedded() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(|| match Catalog::from_yaml(EMBEDDED_CATALOG) {
            Ok(catalog) => catalog,
            Err(err) => {
                error!(error = %err, "embedded business catalog is unreadable, using builtin");
                Catalog::builtin()
            }
        })
    }

    /// Single-category catalog used when the embedded one is broken.
    pub fn builtin() -> Self {
        let mut families = IndexMap::new();
        families.insert(
            "general".to_string(),
            Family {
                tagline: "Quality service you can count on".into(),
                accent: DEFAULT_ACCENT.into(),
                services: vec!["Our Services".into(), "About Us".into(), "Get in Touch".into()],
            },
        );
        Self {
            default_category: "business".into(),
            families,
            categories: vec![Category {
                id: "business".into(),
                label: "Business".into(),
                family: "general".into(),
                keywords: Vec::new(),
                services: Vec::new(),
            }],
        }
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.get(name)
    }

    /// Services for a category, falling back to its family's list.
    pub fn services_for(&self, id: &str) -> Vec<String> {
        let Some(category) = self.category(id) else {
            return Vec::new();
        };
        if !category.services.is_empty() {
            return category.services.clone();
        }
        self.family(&category.family)
            .map(|f| f.services.clone())
            .unwrap_or_default()
    }

    pub fn accent_for(&self, id: &str) -> &str {
        self.category(id)
            .and_then(|c| self.family(&c.family))
            .map(|f| f.accent.as_str())
            .unwrap_or(DEFAULT_ACCENT)
    }

    pub fn tagline_for(&self, id: &str) -> Option<&str> {
        self.category(id)
            .and_then(|c| self.family(&c.family))
            .map(|f| f.tagline.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: String,
    pub label: String,
    pub confidence: f64,
    pub score: u32,
}

struct KeywordMatcher {
    pattern: Regex,
    weight: u32,
}

pub struct Classifier<'a> {
    catalog: &'a Catalog,
    matchers: Vec<Vec<KeywordMatcher>>,
}

impl<'a> Classifier<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        let matchers = catalog
            .categories
            .iter()
            .map(|category| {
                category
                    .keywords
                    .iter()
                    .filter_map(|keyword| {
                        let keyword = keyword.trim();
                        if keyword.is_empty() {
                            return None;
                        }
                        let pattern =
                            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword))).ok()?;
                        let weight = 2 * keyword.split_whitespace().count() as u32;
                        Some(KeywordMatcher { pattern, weight })
                    })
                    .collect()
            })
            .collect();
        Self { catalog, matchers }
    }

    pub fn classify(&self, prompt: &str) -> Classification {
        let mut best: Option<(usize, u32)> = None;
        for (idx, matchers) in self.matchers.iter().enumerate() {
            let score: u32 = matchers
                .iter()
                .filter(|m| m.pattern.is_match(prompt))
                .map(|m| m.weight)
                .sum();
            // strictly greater keeps the earlier entry on ties
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) => {
                let category = &self.catalog.categories[idx];
                let confidence = (f64::from(score) / 10.0).min(1.0);
                debug!(category = %category.id, score, confidence, "classified prompt");
                Classification {
                    category: category.id.clone(),
                    label: category.label.clone(),
                    confidence,
                    score,
                }
            }
            None => {
                let id = self.catalog.default_category.clone();
                let label = self
                    .catalog
                    .category(&id)
                    .map(|c| c.label.clone())
                    .unwrap_or_else(|| "Business".to_string());
                Classification {
                    category: id,
                    label,
                    confidence: DEFAULT_CONFIDENCE,
                    score: 0,
                }
            }
        }
    }
}

/// Classify against the embedded catalog.
pub fn classify(prompt: &str) -> Classification {
    static CLASSIFIER: OnceLock<Classifier<'static>> = OnceLock::new();
    CLASSIFIER
        .get_or_init(|| Classifier::new(Catalog::embedded()))
        .classify(prompt)
}

fn quoted_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["“]([^"”\n]{2,60})["”]"#).expect("static regex is valid"))
}

fn introduced_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?i:for|called|named)\s+([A-Z][\w&'\-]*(?:\s+[A-Z][\w&'\-]*)*)")
            .expect("static regex is valid")
    })
}

fn place() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:based in|located in|in|at)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?(?:,\s*[A-Z]{2})?)")
            .expect("static regex is valid")
    })
}

/// Place the business is in: a capitalised name after "in", "at",
/// "based in" or "located in", optionally with a state code.
pub fn extract_location(prompt: &str) -> Option<String> {
    place().captures(prompt).map(|caps| caps[1].to_string())
}

/// Business name from the prompt: a quoted phrase, else the capitalised
/// words right after "for", "called" or "named".
pub fn extract_business_name(prompt: &str) -> Option<String> {
    if let Some(caps) = quoted_name().captures(prompt) {
        let name = caps[1].trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    introduced_name()
        .captures_iter(prompt)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|name| !name.is_empty())
}
