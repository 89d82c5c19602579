//! Drives one generation request through the candidate models: retries,
//! fallbacks, the completeness follow-up, and the offline failsafe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::classify;
use crate::enhance::{enhance, EnhanceConfig, EnhanceReport};
use crate::errors::BackendError;
use crate::failsafe;
use crate::log::ArtifactStore;
use crate::parse::{parse_response, Extracted, Strategy};
use crate::prompt::{self, PromptPair};
use crate::provider::{BackendRequest, DynProvider};
use crate::requirements::{RequirementSet, ValidationReport};
use crate::wire::{GenerationRequest, Project};

mod ledger;
mod limiter;

pub use ledger::{AttemptLedger, AttemptOutcome, AttemptRecord, TerminalReason};
pub use limiter::RequestLimiter;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn next_delay(&self, current: Duration) -> Duration {
        if current >= self.max_delay {
            return self.max_delay;
        }
        let scaled = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier.max(1.0));
        scaled.min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub max_attempts_per_model: u32,
    /// Checklist score (0-100) under which one emphasized retry is made.
    pub min_completeness: f64,
    pub max_output_tokens: u32,
    pub backoff: BackoffConfig,
    pub max_concurrent: usize,
    pub min_spacing: Duration,
    pub enhance: EnhanceConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_model: 2,
            min_completeness: 70.0,
            max_output_tokens: 16_000,
            backoff: BackoffConfig::default(),
            max_concurrent: 3,
            min_spacing: Duration::from_millis(500),
            enhance: EnhanceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectSource {
    Backend { model: String, strategy: Strategy },
    Failsafe { category: String, confidence: f64 },
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub project: Project,
    pub source: ProjectSource,
    pub ledger: AttemptLedger,
    pub report: EnhanceReport,
    pub completeness: Option<ValidationReport>,
}

/// A usable project from one backend attempt.
struct Candidate {
    project: Project,
    model: String,
    strategy: Strategy,
    report: EnhanceReport,
    validation: ValidationReport,
}

enum Step {
    Valid(Candidate),
    Unusable,
    Failed(BackendError),
}

enum Finish {
    Success(Candidate),
    EditUnusable,
    Exhausted,
    Fatal,
}

/// What a single attempt is working with.
struct AttemptCtx<'a> {
    request: &'a GenerationRequest,
    requirements: &'a RequirementSet,
    prompts: &'a PromptPair,
}

pub struct Orchestrator {
    provider: DynProvider,
    config: OrchestratorConfig,
    limiter: RequestLimiter,
    artifacts: Option<ArtifactStore>,
}

impl Orchestrator {
    pub fn new(provider: DynProvider, config: OrchestratorConfig) -> Self {
        let limiter = RequestLimiter::new(config.max_concurrent, config.min_spacing);
        Self {
            provider,
            config,
            limiter,
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Always yields a project: a backend one, the unchanged prior project
    /// (edit mode), or a synthesized one.
    pub async fn generate(&self, request: &GenerationRequest) -> Generation {
        let mut ledger = AttemptLedger::new();
        let requirements = RequirementSet::extract(&request.prompt);
        let prompts = prompt::for_request(&request.prompt, request.existing.as_ref(), &requirements);
        let ctx = AttemptCtx {
            request,
            requirements: &requirements,
            prompts: &prompts,
        };
        info!(
            txid = %ledger.txid,
            edit = request.is_edit(),
            models = request.models.len(),
            requirements = requirements.total(),
            "generation started"
        );

        let finish = self.run_models(&ctx, &mut ledger).await;
        let generation = self.conclude(request, finish, ledger);
        self.persist(&generation);
        info!(
            txid = %generation.ledger.txid,
            attempts = generation.ledger.attempts(),
            models = ?generation.ledger.models_tried(),
            source = ?generation.source,
            "generation finished"
        );
        generation
    }

    async fn run_models(&self, ctx: &AttemptCtx<'_>, ledger: &mut AttemptLedger) -> Finish {
        let edit = ctx.request.is_edit();
        'models: for model in &ctx.request.models {
            let mut delay = self.config.backoff.initial_delay;
            while ledger.attempts_for(model) < self.config.max_attempts_per_model {
                if ledger.attempts() >= ctx.request.max_attempts {
                    warn!(max = ctx.request.max_attempts, "global attempt budget spent");
                    break 'models;
                }
                match self.attempt(ctx, model, ctx.prompts, false, ledger).await {
                    Step::Valid(candidate) => {
                        let best = if edit {
                            candidate
                        } else {
                            self.emphasize_if_short(ctx, candidate, ledger).await
                        };
                        return Finish::Success(best);
                    }
                    Step::Unusable if edit => return Finish::EditUnusable,
                    Step::Unusable => continue 'models,
                    Step::Failed(err) if !err.is_transient() => {
                        warn!(model = %model, error = %err, "backend refused the request, giving up");
                        return Finish::Fatal;
                    }
                    Step::Failed(err) if err.is_retryable_same_model() => {
                        let wait = match &err {
                            BackendError::RateLimited { retry_after: Some(after) } => {
                                (*after).min(self.config.backoff.max_delay)
                            }
                            _ => delay,
                        };
                        warn!(model = %model, error = %err, wait_ms = wait.as_millis() as u64, "backing off");
                        tokio::time::sleep(wait).await;
                        delay = self.config.backoff.next_delay(delay);
                    }
                    Step::Failed(BackendError::Malformed(_)) if edit => return Finish::EditUnusable,
                    Step::Failed(err) => {
                        warn!(model = %model, error = %err, "moving to next model");
                        continue 'models;
                    }
                }
            }
        }
        Finish::Exhausted
    }

    /// One emphasized follow-up on the same model when the checklist score is low.
    async fn emphasize_if_short(
        &self,
        ctx: &AttemptCtx<'_>,
        first: Candidate,
        ledger: &mut AttemptLedger,
    ) -> Candidate {
        let score = first.validation.completeness_score;
        if score >= self.config.min_completeness {
            return first;
        }
        if ledger.attempts() >= ctx.request.max_attempts
            || ledger.attempts_for(&first.model) >= self.config.max_attempts_per_model
        {
            info!(score, "checklist short but no budget left for a follow-up");
            return first;
        }

        info!(model = %first.model, score, missing = first.validation.missing.len(), "retrying with missing requirements");
        let prompts = PromptPair {
            system: ctx.prompts.system.clone(),
            user: prompt::user_prompt_emphasized(
                &ctx.request.prompt,
                ctx.requirements,
                &first.validation.missing,
            ),
        };
        let model = first.model.clone();
        match self.attempt(ctx, &model, &prompts, true, ledger).await {
            Step::Valid(second) if second.validation.completeness_score > score => {
                info!(before = score, after = second.validation.completeness_score, "follow-up improved coverage");
                second
            }
            _ => first,
        }
    }

    async fn attempt(
        &self,
        ctx: &AttemptCtx<'_>,
        model: &str,
        prompts: &PromptPair,
        emphasized: bool,
        ledger: &mut AttemptLedger,
    ) -> Step {
        let backend_req = BackendRequest {
            system: prompts.system.clone(),
            user: prompts.user.clone(),
            model: model.to_string(),
            max_output_tokens: self.config.max_output_tokens,
        };
        let number = ledger.next_attempt();
        let started_at = Utc::now();
        let clock = Instant::now();
        let result = self.call(&backend_req, ctx.request.timeout).await;
        let elapsed_ms = clock.elapsed().as_millis() as u64;

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                warn!(attempt = number, model, error = %err, "backend call failed");
                ledger.record(model, emphasized, started_at, elapsed_ms, AttemptOutcome::from(&err));
                return Step::Failed(err);
            }
        };
        self.save_raw(ledger, number, model, &raw.text);
        let parsed = parse_response(&raw.text);
        ledger.retain(raw);

        let extracted = match parsed {
            Ok(extracted) => extracted,
            Err(failure) => {
                warn!(attempt = number, model, error = %failure, "response unparseable");
                ledger.record(
                    model,
                    emphasized,
                    started_at,
                    elapsed_ms,
                    AttemptOutcome::ParseFailed { response_len: failure.response_len },
                );
                return Step::Unusable;
            }
        };

        let strategy = extracted.strategy;
        let mut project = assemble(extracted, ctx.request.existing.as_ref());
        let report = enhance(&mut project, &self.config.enhance);
        if !project.is_valid(self.config.enhance.min_html) {
            warn!(attempt = number, model, %strategy, "recovered project has no usable page");
            ledger.record(model, emphasized, started_at, elapsed_ms, AttemptOutcome::InvalidProject { strategy });
            return Step::Unusable;
        }

        let validation = ctx.requirements.validate(project.primary_html().unwrap_or(""));
        info!(
            attempt = number,
            model,
            %strategy,
            files = project.files.len(),
            score = validation.completeness_score,
            "attempt produced a project"
        );
        ledger.record(
            model,
            emphasized,
            started_at,
            elapsed_ms,
            AttemptOutcome::Success {
                strategy,
                files: project.files.len(),
                score: validation.completeness_score,
            },
        );
        Step::Valid(Candidate {
            project,
            model: model.to_string(),
            strategy,
            report,
            validation,
        })
    }

    async fn call(&self, req: &BackendRequest, timeout: Duration) -> Result<crate::wire::RawResponse, BackendError> {
        let _permit = self.limiter.acquire().await?;
        match tokio::time::timeout(timeout, self.provider.complete(req)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout)),
        }
    }

    fn conclude(&self, request: &GenerationRequest, finish: Finish, mut ledger: AttemptLedger) -> Generation {
        let existing = request.existing.as_ref().filter(|_| request.is_edit());
        match (finish, existing) {
            (Finish::Success(c), _) => {
                ledger.finish(TerminalReason::Succeeded);
                Generation {
                    project: c.project,
                    source: ProjectSource::Backend { model: c.model, strategy: c.strategy },
                    ledger,
                    report: c.report,
                    completeness: Some(c.validation),
                }
            }
            (finish, Some(prior)) => {
                let reason = match finish {
                    Finish::Fatal => TerminalReason::FatalUpstream,
                    Finish::Exhausted => TerminalReason::Exhausted,
                    _ => TerminalReason::EditUnusable,
                };
                warn!(?reason, "edit failed, keeping the existing project");
                ledger.finish(reason);
                Generation {
                    project: prior.clone(),
                    source: ProjectSource::Unchanged,
                    ledger,
                    report: EnhanceReport::default(),
                    completeness: None,
                }
            }
            (finish, None) => {
                let reason = match finish {
                    Finish::Fatal => TerminalReason::FatalUpstream,
                    _ => TerminalReason::Exhausted,
                };
                ledger.finish(reason);
                let classification = classify::classify(&request.prompt);
                warn!(
                    ?reason,
                    category = %classification.category,
                    confidence = classification.confidence,
                    "no backend project, using offline site"
                );
                let project = failsafe::synthesize(&request.prompt, &classification, classify::Catalog::embedded());
                Generation {
                    project,
                    source: ProjectSource::Failsafe {
                        category: classification.category,
                        confidence: classification.confidence,
                    },
                    ledger,
                    report: EnhanceReport::default(),
                    completeness: None,
                }
            }
        }
    }

    fn save_raw(&self, ledger: &AttemptLedger, attempt: u32, model: &str, text: &str) {
        let Some(store) = &self.artifacts else { return };
        if let Err(err) = store.save_raw(ledger.txid, attempt, model, text) {
            warn!(error = %err, "could not save raw response");
        }
    }

    fn persist(&self, generation: &Generation) {
        let Some(store) = &self.artifacts else { return };
        let txid = generation.ledger.txid;
        if let Err(err) = store.save_project(txid, &generation.project) {
            warn!(error = %err, "could not save project artifact");
        }
        if let Err(err) = store.save_ledger(txid, &generation.ledger) {
            warn!(error = %err, "could not save attempt ledger");
        }
    }
}

/// Project from a parse result; in edit mode the returned files are laid
/// over the prior project so omitted files survive.
fn assemble(extracted: Extracted, existing: Option<&Project>) -> Project {
    match existing.filter(|p| !p.files.is_empty()) {
        Some(prior) => {
            let mut project = prior.clone();
            project.files.extend(extracted.files);
            if let Some(cfg) = extracted.deploy_config {
                project.deploy_config = cfg;
            }
            project
        }
        None => Project::new(extracted.files, extracted.deploy_config.unwrap_or_default()),
    }
}

/// Shared handle for running several requests concurrently.
pub type SharedOrchestrator = Arc<Orchestrator>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{DeployConfig, FilesMap};

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(cfg.next_delay(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(cfg.next_delay(Duration::from_millis(200)), Duration::from_millis(350));
        assert_eq!(cfg.next_delay(Duration::from_millis(350)), Duration::from_millis(350));
    }

    #[test]
    fn edit_results_overlay_prior_files() {
        let mut prior = FilesMap::new();
        prior.insert("index.html".into(), "old".into());
        prior.insert("about.html".into(), "keep".into());
        let prior = Project::new(prior, DeployConfig::default());

        let mut returned = FilesMap::new();
        returned.insert("index.html".into(), "new".into());
        returned.insert("contact.html".into(), "added".into());
        let extracted = Extracted {
            files: returned,
            deploy_config: None,
            strategy: Strategy::Structured,
        };

        let merged = assemble(extracted, Some(&prior));
        assert_eq!(merged.files["index.html"], "new");
        assert_eq!(merged.files["about.html"], "keep");
        assert_eq!(merged.files["contact.html"], "added");
        assert_eq!(merged.files.len(), 3);
    }
}
