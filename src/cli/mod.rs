use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "sitesmith", version, about = "Generate deployable static sites from a prompt, with retries and an offline fallback")]
pub struct Args {
    /// Site description; repeat to generate several sites concurrently.
    #[arg(long, required = true)]
    pub prompt: Vec<String>,

    /// Existing project JSON to edit instead of creating a new site.
    #[arg(long)]
    pub edit: Option<PathBuf>,

    /// Candidate model, tried in the order given; repeatable.
    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where to write the project JSON; stdout when absent.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Skip the backends and build the offline site directly.
    #[arg(long, default_value_t = false)]
    pub offline: bool,

    #[arg(long, default_value_t = false)]
    pub save_responses: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Args {
    /// Flags win over the config file.
    pub fn apply_to(&self, cfg: &mut Config) {
        if !self.models.is_empty() {
            cfg.models = self.models.clone();
        }
        if let Some(t) = self.timeout_secs {
            cfg.timeout_secs = t;
        }
        if let Some(n) = self.max_attempts {
            cfg.max_attempts = n;
        }
        if self.save_responses {
            cfg.save_responses = true;
        }
        if self.offline {
            cfg.models.clear();
        }
    }
}
