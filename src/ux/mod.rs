use std::time::Duration;

use colored::Colorize;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{AttemptOutcome, Generation, ProjectSource};

/// Spinner on stderr while requests are in flight; hidden when `quiet`.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn source_line(source: &ProjectSource) -> String {
    match source {
        ProjectSource::Backend { model, strategy } => {
            format!("{} {} via {}", "[BACKEND]".green().bold(), model, strategy)
        }
        ProjectSource::Failsafe { category, confidence } => format!(
            "{} offline site for {} (confidence {:.0}%)",
            "[FAILSAFE]".yellow().bold(),
            category,
            confidence * 100.0
        ),
        ProjectSource::Unchanged => format!("{} prior project kept", "[UNCHANGED]".cyan().bold()),
    }
}

fn outcome_label(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Success { strategy, score, .. } => {
            format!("{} {} score {:.0}", "ok".green(), strategy, score)
        }
        AttemptOutcome::ParseFailed { response_len } => {
            format!("{} {}", "unparseable".red(), format_size(*response_len, DECIMAL))
        }
        AttemptOutcome::InvalidProject { strategy } => format!("{} via {}", "no page".red(), strategy),
        AttemptOutcome::Unavailable { status } => format!("{} {}", "unavailable".red(), status),
        AttemptOutcome::Timeout => "timeout".red().to_string(),
        AttemptOutcome::RateLimited => "rate limited".yellow().to_string(),
        AttemptOutcome::Network { message } => format!("{} {}", "network".yellow(), message),
        AttemptOutcome::Rejected { status, message } => format!("{} {} {}", "rejected".red().bold(), status, message),
        AttemptOutcome::ModelRefused { status, message } => format!("{} {} {}", "refused".red(), status, message),
        AttemptOutcome::Malformed { message } => format!("{} {}", "malformed".red(), message),
    }
}

/// Summary of one generation, written to stderr.
pub fn print_generation_dashboard(prompt: &str, generation: &Generation) {
    let project = &generation.project;
    eprintln!(
        "\n{}",
        "┏━━━━━━━━━━━━━━━━━━━━━━━━ Generation ━━━━━━━━━━━━━━━━━━━━━━━━┓".bold()
    );
    let shown: String = prompt.chars().take(60).collect();
    eprintln!("  {}: {}", "Prompt".bold(), shown);
    eprintln!("  {}", source_line(&generation.source));
    eprintln!(
        "  {}: {}   {}: {}   {}: {}",
        "Files".bold(),
        project.files.len(),
        "Size".bold(),
        format_size(project.total_bytes(), DECIMAL),
        "Attempts".bold(),
        generation.ledger.attempts()
    );
    if let Some(check) = &generation.completeness {
        eprintln!(
            "  {}: {:.0}% ({} found, {} missing)",
            "Checklist".bold(),
            check.completeness_score,
            check.found.len(),
            check.missing.len()
        );
    }
    if !generation.report.repairs.is_empty() {
        eprintln!("  {}: {}", "Repairs".bold(), generation.report.repairs.len());
    }
    eprintln!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());

    for r in &generation.ledger.records {
        eprintln!(
            "  #{} {}{} {}ms  {}",
            r.attempt,
            r.model.bold(),
            if r.emphasized { " (emphasized)" } else { "" },
            r.elapsed_ms,
            outcome_label(&r.outcome)
        );
    }
    for (path, content) in &project.files {
        eprintln!("    {} {}", path, format_size(content.len(), DECIMAL).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Strategy;

    #[test]
    fn labels_mention_the_essentials() {
        colored::control::set_override(false);
        let ok = outcome_label(&AttemptOutcome::Success { strategy: Strategy::CodeBlocks, files: 3, score: 85.0 });
        assert_eq!(ok, "ok code-blocks score 85");
        let src = source_line(&ProjectSource::Failsafe { category: "bakery".into(), confidence: 0.4 });
        assert!(src.contains("bakery (confidence 40%)"));
    }
}
