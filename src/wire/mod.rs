use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// ========================================
/// Request/Response wire types
/// ========================================

/// Relative path → file content, in insertion order.
pub type FilesMap = IndexMap<String, String>;

/// One user action: generate a new site, or edit `existing`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub existing: Option<Project>,
    pub models: Vec<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<String>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            prompt: prompt.into(),
            existing: None,
            models,
            timeout,
            max_attempts,
        }
    }

    pub fn editing(mut self, project: Project) -> Self {
        self.existing = Some(project);
        self
    }

    /// Edit mode only applies when there is something to preserve.
    pub fn is_edit(&self) -> bool {
        self.existing.as_ref().map(|p| !p.files.is_empty()).unwrap_or(false)
    }
}

/// Unstructured text from a single backend call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawResponse {
    pub model: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl RawResponse {
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    #[serde(default)]
    pub build_command: String,
    #[serde(default = "default_publish_dir")]
    pub publish_dir: String,
    #[serde(default = "default_functions_dir")]
    pub functions_dir: String,
    /// Anything else the backend put in here; passed through untouched.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_publish_dir() -> String {
    ".".into()
}

fn default_functions_dir() -> String {
    "netlify/functions".into()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            build_command: String::new(),
            publish_dir: default_publish_dir(),
            functions_dir: default_functions_dir(),
            extra: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub files: FilesMap,
    #[serde(default)]
    pub deploy_config: DeployConfig,
}

pub fn is_html_path(path: &str) -> bool {
    let p = path.to_ascii_lowercase();
    p.ends_with(".html") || p.ends_with(".htm")
}

impl Project {
    pub fn new(files: FilesMap, deploy_config: DeployConfig) -> Self {
        Self { files, deploy_config }
    }

    /// Path of the page everything hangs off: `index.html`, else the first HTML entry.
    pub fn primary_html_path(&self) -> Option<&str> {
        if self.files.contains_key("index.html") {
            return Some("index.html");
        }
        self.files.keys().find(|k| is_html_path(k)).map(String::as_str)
    }

    pub fn primary_html(&self) -> Option<&str> {
        self.primary_html_path()
            .and_then(|p| self.files.get(p))
            .map(String::as_str)
    }

    pub fn is_valid(&self, min_html: usize) -> bool {
        self.files
            .iter()
            .any(|(path, content)| is_html_path(path) && content.chars().count() > min_html)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }
}
