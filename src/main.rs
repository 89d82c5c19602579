use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fs_err as fs;
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sitesmith::cli::Args;
use sitesmith::config::Config;
use sitesmith::log::{write_atomic, ArtifactStore};
use sitesmith::orchestrator::{Generation, Orchestrator, SharedOrchestrator};
use sitesmith::provider::{DynProvider, ModelRouter};
use sitesmith::ux;
use sitesmith::wire::Project;

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut cfg = Config::load(args.config.as_deref())?;
    args.apply_to(&mut cfg);

    let existing = match &args.edit {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let project: Project = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a project JSON file", path.display()))?;
            Some(project)
        }
        None => None,
    };

    let provider: DynProvider = Arc::new(ModelRouter::new(&cfg));
    let store = ArtifactStore::new(&cfg.out_dir, cfg.save_responses);
    let orchestrator: SharedOrchestrator =
        Arc::new(Orchestrator::new(provider, cfg.orchestrator_config()).with_artifacts(store));

    info!(
        prompts = args.prompt.len(),
        models = ?cfg.models,
        max_concurrent = orchestrator.config().max_concurrent,
        "starting"
    );
    let spinner = ux::spinner("generating", args.debug);
    let runs = args.prompt.iter().map(|prompt| {
        let orchestrator = Arc::clone(&orchestrator);
        let mut request = cfg.request(prompt.clone());
        if let Some(project) = &existing {
            request = request.editing(project.clone());
        }
        async move { orchestrator.generate(&request).await }
    });
    let generations: Vec<Generation> = join_all(runs).await;
    spinner.finish_and_clear();

    for (prompt, generation) in args.prompt.iter().zip(&generations) {
        ux::print_generation_dashboard(prompt, generation);
    }

    let json = if generations.len() == 1 {
        serde_json::to_string_pretty(&generations[0].project)?
    } else {
        let projects: Vec<&Project> = generations.iter().map(|g| &g.project).collect();
        serde_json::to_string_pretty(&projects)?
    };
    match &args.out {
        Some(path) => {
            write_atomic(path, json.as_bytes())?;
            info!(path = %path.display(), "project written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
