//! Prompt-derived checklist and the completeness score used to decide
//! whether a second, requirement-emphasized attempt is worth paying for.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const SECTION_KEYWORDS: &[&str] = &[
    "hero", "header", "footer", "navbar", "navigation", "menu", "about", "features", "pricing",
    "testimonials", "gallery", "contact", "form", "blog", "portfolio", "services", "team", "faq",
    "banner", "sidebar", "carousel", "slider",
];

const FEATURE_KEYWORDS: &[&str] = &[
    "search", "filter", "authentication", "login", "signup", "cart", "checkout", "payment",
    "subscribe", "newsletter", "social", "share", "comment", "rating", "review",
];

const ELEMENT_KEYWORDS: &[&str] = &[
    "button", "link", "image", "video", "icon", "card", "modal", "popup", "dropdown", "tooltip",
    "badge", "alert", "notification", "progress", "spinner",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementSet {
    pub sections: Vec<String>,
    pub features: Vec<String>,
    pub elements: Vec<String>,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub completeness_score: f64,
}

impl ValidationReport {
    pub fn all_met(&self) -> bool {
        self.missing.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if item.is_empty() || list.iter().any(|x| x.eq_ignore_ascii_case(item)) {
        return;
    }
    list.push(item.to_string());
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

static_regex!(numbered_item, r"(?m)^\s*\d+[.)]\s*([^\n]+)");
static_regex!(bullet_item, r"(?m)^\s*[-*•]\s+([^\n]+)");
static_regex!(quoted_fragment, r#"(?:^|[^\w])["“']([^"”'\n]{3,}?)["”'](?:[^\w]|$)"#);
static_regex!(count_noun, r"\b(\d+)\s+([A-Za-z]+)");
static_regex!(enumeration, r"(?i)\b(?:with|including|featuring|that has|which has)\s+([^.!?\n]+)");
static_regex!(list_separator, r"(?i)\s*,\s*(?:and\s+|or\s+)?|\s+and\s+");
static_regex!(fallback_separator, r"(?i)[,;]|\s+with\s+|\s+and\s+|\s+including\s+");

fn strip_article(item: &str) -> &str {
    let trimmed = item.trim().trim_end_matches(['.', ',', ';', ':']);
    for article in ["a ", "an ", "the ", "some "] {
        let head = trimmed.get(..article.len());
        if trimmed.len() > article.len() && head.is_some_and(|h| h.eq_ignore_ascii_case(article)) {
            return trimmed[article.len()..].trim();
        }
    }
    trimmed
}

impl RequirementSet {
    /// Build the checklist for `prompt`. Pure and deterministic.
    pub fn extract(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        let mut set = RequirementSet::default();

        for k in SECTION_KEYWORDS.iter().filter(|k| lower.contains(*k)) {
            push_unique(&mut set.sections, k);
        }
        for k in FEATURE_KEYWORDS.iter().filter(|k| lower.contains(*k)) {
            push_unique(&mut set.features, k);
        }
        for k in ELEMENT_KEYWORDS.iter().filter(|k| lower.contains(*k)) {
            push_unique(&mut set.elements, k);
        }

        for caps in numbered_item().captures_iter(prompt) {
            push_unique(&mut set.content, &caps[1]);
        }
        for caps in bullet_item().captures_iter(prompt) {
            push_unique(&mut set.content, &caps[1]);
        }
        for caps in count_noun().captures_iter(prompt) {
            push_unique(&mut set.content, &format!("{} {}", &caps[1], &caps[2]));
        }
        for caps in quoted_fragment().captures_iter(prompt) {
            push_unique(&mut set.content, &caps[1]);
        }
        for caps in enumeration().captures_iter(prompt) {
            for item in list_separator().split(&caps[1]) {
                let item = strip_article(item);
                if item.chars().count() > 3 {
                    push_unique(&mut set.content, item);
                }
            }
        }

        if set.is_empty() {
            for part in fallback_separator().split(prompt) {
                let part = part.trim();
                if part.chars().count() > 3 {
                    push_unique(&mut set.content, part);
                }
            }
        }
        set
    }

    pub fn total(&self) -> usize {
        self.sections.len() + self.features.len() + self.elements.len() + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Checkbox list pasted into generation prompts.
    pub fn checklist(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut block = |title: &str, items: &[String], fmt: &dyn Fn(&str) -> String| {
            if items.is_empty() {
                return;
            }
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(title.to_string());
            lines.extend(items.iter().map(|i| format!("  ☐ {}", fmt(i))));
        };
        block("SECTIONS TO INCLUDE:", &self.sections, &|s: &str| format!("{} section", title_case(s)));
        block("FEATURES TO IMPLEMENT:", &self.features, &|s: &str| format!("{} functionality", title_case(s)));
        block("ELEMENTS TO ADD:", &self.elements, &|s: &str| format!("{} elements", title_case(s)));
        block("SPECIFIC CONTENT REQUESTED:", &self.content, &|s: &str| s.to_string());
        if lines.is_empty() {
            lines.push("☐ Implement all features described in the prompt".to_string());
        }
        lines.join("\n")
    }

    /// Score how much of the checklist made it into `html`.
    pub fn validate(&self, html: &str) -> ValidationReport {
        let html = html.to_lowercase();
        let mut found = Vec::new();
        let mut missing = Vec::new();

        let keyword_groups = [
            ("Section", &self.sections),
            ("Feature", &self.features),
            ("Element", &self.elements),
        ];
        for (label, items) in keyword_groups {
            for item in items {
                let entry = format!("{label}: {item}");
                if html.contains(&item.to_lowercase()) {
                    found.push(entry);
                } else {
                    missing.push(entry);
                }
            }
        }
        for item in &self.content {
            let entry = format!("Content: {item}");
            let lowered = item.to_lowercase();
            let hit = lowered
                .split_whitespace()
                .filter(|w| w.chars().count() > 3)
                .any(|w| html.contains(w));
            if hit {
                found.push(entry);
            } else {
                missing.push(entry);
            }
        }

        let total = found.len() + missing.len();
        let completeness_score = if total == 0 {
            100.0
        } else {
            found.len() as f64 / total as f64 * 100.0
        };
        ValidationReport { found, missing, completeness_score }
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAW_FIRM: &str = "Create a law firm website with practice areas, attorney bios, and a contact form";

    #[test]
    fn law_firm_prompt_yields_sections_and_content() {
        let set = RequirementSet::extract(LAW_FIRM);
        assert!(set.sections.contains(&"contact".to_string()));
        assert!(set.content.contains(&"practice areas".to_string()));
        assert!(set.content.contains(&"attorney bios".to_string()));
    }

    #[test]
    fn complete_page_scores_100() {
        let set = RequirementSet::extract(LAW_FIRM);
        let html = "<section>Practice Areas</section><section>Attorney Bios</section><form id=contact>Contact form</form>";
        let report = set.validate(html);
        assert_eq!(report.completeness_score, 100.0);
        assert!(report.all_met());
    }

    #[test]
    fn partial_page_scores_strictly_between() {
        let set = RequirementSet::extract(LAW_FIRM);
        let report = set.validate("<h2>Practice areas</h2>");
        assert!(report.completeness_score > 0.0 && report.completeness_score < 100.0);
        assert!(report.missing.iter().any(|m| m == "Section: contact"));
    }

    #[test]
    fn empty_set_scores_100() {
        let set = RequirementSet::default();
        assert_eq!(set.validate("").completeness_score, 100.0);
        assert_eq!(RequirementSet::extract("").total(), 0);
    }

    #[test]
    fn structural_items_are_extracted() {
        let prompt = "Bakery site:\n1. Daily specials\n2) Opening hours\n- Online ordering\nShow 3 cakes and the slogan \"Fresh every morning\"";
        let set = RequirementSet::extract(prompt);
        for expected in ["Daily specials", "Opening hours", "Online ordering", "3 cakes", "Fresh every morning"] {
            assert!(set.content.iter().any(|c| c == expected), "missing {expected}: {:?}", set.content);
        }
    }

    #[test]
    fn hyphenated_words_are_not_bullets() {
        let set = RequirementSet::extract("a state-of-the-art dashboard");
        assert!(!set.content.iter().any(|c| c.starts_with("of-the")));
    }

    #[test]
    fn unmatched_prompt_falls_back_to_fragments() {
        let set = RequirementSet::extract("quiet lakeside cabins; kayak rentals");
        assert_eq!(set.content, vec!["quiet lakeside cabins", "kayak rentals"]);
    }

    #[test]
    fn duplicates_are_removed_case_insensitively() {
        let set = RequirementSet::extract("- Gallery\n- gallery");
        assert_eq!(set.content, vec!["Gallery"]);
    }

    #[test]
    fn checklist_lists_every_category() {
        let set = RequirementSet::extract(LAW_FIRM);
        let text = set.checklist();
        assert!(text.contains("☐ Contact section"));
        assert!(text.contains("SPECIFIC CONTENT REQUESTED:"));
        assert!(text.contains("☐ attorney bios"));
        assert_eq!(
            RequirementSet::default().checklist(),
            "☐ Implement all features described in the prompt"
        );
    }
}
