//! End-to-end campaign pipeline: validate → research → copy → QA → finalize.
//!
//! One [`Pipeline`] serves any number of concurrent runs. It owns only its
//! capabilities and configuration, and every run keeps its state on its own
//! stack.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use outreach_llm::TextGenerator;
use outreach_shared::{
    AppConfig, CampaignResult, DraftEmails, ErrorKind, OutreachError, QaVerdict, ResearchArtifact,
    Result,
};
use outreach_web::PageFetcher;

use crate::copy::CopyStage;
use crate::qa::QaStage;
use crate::research::{ResearchSettings, ResearchStage};
use crate::validator::{validate_input, validate_output};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Where a run is. Runs only move forward one step at a time, or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Start,
    Validating,
    Researching,
    Copywriting,
    Assessing,
    Finalizing,
    Succeeded,
    Failed(ErrorKind),
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Validating => "validating",
            Self::Researching => "researching",
            Self::Copywriting => "copywriting",
            Self::Assessing => "assessing",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// The single forward successor, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Validating),
            Self::Validating => Some(Self::Researching),
            Self::Researching => Some(Self::Copywriting),
            Self::Copywriting => Some(Self::Assessing),
            Self::Assessing => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Succeeded),
            Self::Succeeded | Self::Failed(_) => None,
        }
    }

    /// Forward by one step, or to `Failed` from any non-terminal state.
    pub fn can_transition_to(&self, to: Self) -> bool {
        match to {
            Self::Failed(_) => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(kind) => write!(f, "failed({kind})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Observer for run progress.
pub trait ProgressReporter: Send + Sync {
    /// Called on every state transition, terminal ones included.
    fn transition(&self, from: PipelineState, to: PipelineState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn transition(&self, _from: PipelineState, _to: PipelineState) {}
}

/// Current state of one run plus the reporter observing it.
struct RunTracker<'a> {
    state: Mutex<PipelineState>,
    progress: &'a dyn ProgressReporter,
}

impl<'a> RunTracker<'a> {
    fn new(progress: &'a dyn ProgressReporter) -> Self {
        Self {
            state: Mutex::new(PipelineState::Start),
            progress,
        }
    }

    fn current(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn advance(&self, to: PipelineState) -> Result<()> {
        let from = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let from = *state;
            if !from.can_transition_to(to) {
                return Err(OutreachError::Internal(format!(
                    "illegal pipeline transition {from} -> {to}"
                )));
            }
            *state = to;
            from
        };
        self.progress.transition(from, to);
        Ok(())
    }

    /// Move to `Failed(kind)` unless the run already ended.
    fn fail(&self, kind: ErrorKind) {
        let _ = self.advance(PipelineState::Failed(kind));
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run-wide limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Wall-clock budget for the whole run, not reset per stage.
    pub deadline: Duration,
    pub research: ResearchSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            research: ResearchSettings::default(),
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            deadline: config.pipeline.deadline(),
            research: ResearchSettings::from(&config.scraper),
        }
    }
}

/// The campaign pipeline over a fetch and a generation capability.
pub struct Pipeline<F, G> {
    fetcher: F,
    generator: G,
    config: PipelineConfig,
}

impl<F: PageFetcher, G: TextGenerator> Pipeline<F, G> {
    pub fn new(fetcher: F, generator: G, config: PipelineConfig) -> Self {
        Self {
            fetcher,
            generator,
            config,
        }
    }

    /// Run the full pipeline over a raw request body.
    ///
    /// 1. Validate the request
    /// 2. Research the company site
    /// 3. Draft the emails
    /// 4. Assess spam risk
    /// 5. Assemble and validate the result
    ///
    /// The deadline covers all of it. When it fires, the in-flight stage is
    /// dropped and the run fails with `timeout`.
    #[instrument(
        skip_all,
        fields(run_id = tracing::field::Empty, fingerprint = tracing::field::Empty)
    )]
    pub async fn run(
        &self,
        raw: &Value,
        progress: &dyn ProgressReporter,
    ) -> Result<CampaignResult> {
        let run_id = Uuid::now_v7();
        let span = tracing::Span::current();
        span.record("run_id", tracing::field::display(run_id));
        span.record("fingerprint", fingerprint(raw).as_str());

        let start = Instant::now();
        let tracker = RunTracker::new(progress);

        info!(deadline_ms = self.config.deadline.as_millis(), "starting pipeline run");

        let outcome =
            match tokio::time::timeout(self.config.deadline, self.run_stages(raw, &tracker)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(OutreachError::Timeout(format!(
                    "pipeline deadline of {:?} exceeded while {}",
                    self.config.deadline,
                    tracker.current()
                ))),
            };

        let outcome = outcome.and_then(|result| {
            tracker.advance(PipelineState::Succeeded)?;
            Ok(result)
        });

        match &outcome {
            Ok(result) => info!(
                risk = result.spam_risk_score.as_str(),
                points = result.personalization_points.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "pipeline run succeeded"
            ),
            Err(e) => {
                tracker.fail(e.kind());
                warn!(
                    kind = %e.kind(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "pipeline run failed"
                );
            }
        }

        outcome
    }

    async fn run_stages(&self, raw: &Value, tracker: &RunTracker<'_>) -> Result<CampaignResult> {
        // --- Phase 1: Validate ---
        tracker.advance(PipelineState::Validating)?;
        let request = validate_input(raw)?;

        // --- Phase 2: Research ---
        tracker.advance(PipelineState::Researching)?;
        let research = ResearchStage::new(&self.fetcher, self.config.research)
            .run(&request.company_name, &request.company_website)
            .await?;

        // --- Phase 3: Copy ---
        tracker.advance(PipelineState::Copywriting)?;
        let draft = CopyStage::new(&self.generator)
            .run(&research, &request)
            .await?;

        // --- Phase 4: QA ---
        tracker.advance(PipelineState::Assessing)?;
        let verdict = QaStage::new(&self.generator).run(&draft).await?;
        if !verdict.findings.is_empty() || verdict.notes.is_some() {
            info!(
                risk = verdict.risk.as_str(),
                findings = ?verdict.findings,
                notes = verdict.notes.as_deref().unwrap_or_default(),
                "qa assessment"
            );
        }

        // --- Phase 5: Finalize ---
        tracker.advance(PipelineState::Finalizing)?;
        let candidate = assemble(research, draft, &verdict);
        let candidate = serde_json::to_value(&candidate)
            .map_err(|e| OutreachError::agent(format!("failed to serialize result: {e}")))?;
        validate_output(candidate)
    }
}

/// Combine stage artifacts into the response shape.
fn assemble(research: ResearchArtifact, draft: DraftEmails, verdict: &QaVerdict) -> CampaignResult {
    CampaignResult {
        subject_lines: Vec::from(draft.subject_lines),
        primary_email: draft.primary_email,
        follow_up_email: draft.follow_up_email,
        personalization_points: research.snippets,
        spam_risk_score: verdict.risk,
    }
}

/// SHA-256 of the raw request, logged in place of its content.
pub fn fingerprint(raw: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        ACME_HTML, GOOD_COPY_REPLY, QA_HIGH_REPLY, QA_LOW_REPLY, RecordingProgress,
        ScriptedGenerator, StaticFetcher, acme_input,
    };
    use outreach_llm::GenerationTask;
    use outreach_shared::SpamRisk;
    use serde_json::json;

    fn pipeline(
        fetcher: StaticFetcher,
        generator: ScriptedGenerator,
    ) -> Pipeline<StaticFetcher, ScriptedGenerator> {
        Pipeline::new(fetcher, generator, PipelineConfig::default())
    }

    fn acme_pipeline() -> Pipeline<StaticFetcher, ScriptedGenerator> {
        pipeline(
            StaticFetcher::new(ACME_HTML),
            ScriptedGenerator::new(GOOD_COPY_REPLY, QA_LOW_REPLY),
        )
    }

    #[test]
    fn states_only_move_forward() {
        use PipelineState::*;
        assert!(Start.can_transition_to(Validating));
        assert!(!Start.can_transition_to(Researching));
        assert!(!Copywriting.can_transition_to(Researching));
        assert!(Assessing.can_transition_to(Failed(ErrorKind::Timeout)));
        assert!(!Succeeded.can_transition_to(Failed(ErrorKind::AgentError)));
        assert!(!Failed(ErrorKind::Timeout).can_transition_to(Validating));
        assert_eq!(Finalizing.next(), Some(Succeeded));
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint(&acme_input());
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(&acme_input()));
        assert_ne!(a, fingerprint(&json!({})));
    }

    #[tokio::test]
    async fn acme_run_succeeds() {
        let pipeline = acme_pipeline();
        let progress = RecordingProgress::default();

        let result = pipeline.run(&acme_input(), &progress).await.unwrap();

        assert_eq!(result.subject_lines.len(), 3);
        assert!((1..=5).contains(&result.personalization_points.len()));
        assert!(
            result
                .personalization_points
                .iter()
                .all(|p| ACME_HTML.contains(p.as_str()))
        );
        for body in [&result.primary_email, &result.follow_up_email] {
            assert!(body.split_whitespace().count() <= 120);
            assert!(!body.contains('!'));
        }
        assert_eq!(result.spam_risk_score, SpamRisk::Low);
        assert_eq!(
            pipeline.generator.calls(),
            vec![GenerationTask::Copy, GenerationTask::Qa]
        );
    }

    #[tokio::test]
    async fn states_are_reported_in_order() {
        let pipeline = acme_pipeline();
        let progress = RecordingProgress::default();

        pipeline.run(&acme_input(), &progress).await.unwrap();

        use PipelineState::*;
        assert_eq!(
            progress.states(),
            vec![Validating, Researching, Copywriting, Assessing, Finalizing, Succeeded]
        );
    }

    #[tokio::test]
    async fn repeated_runs_have_the_same_shape() {
        let pipeline = acme_pipeline();
        let first = pipeline.run(&acme_input(), &SilentProgress).await.unwrap();
        let second = pipeline.run(&acme_input(), &SilentProgress).await.unwrap();
        assert_eq!(first.subject_lines.len(), second.subject_lines.len());
        assert_eq!(first.personalization_points, second.personalization_points);
    }

    #[tokio::test]
    async fn missing_field_never_reaches_research() {
        let pipeline = acme_pipeline();
        let progress = RecordingProgress::default();
        let mut raw = acme_input();
        raw.as_object_mut().unwrap().remove("target_role");

        let err = pipeline.run(&raw, &progress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingField);
        assert_eq!(err.to_response().field.as_deref(), Some("target_role"));
        assert_eq!(pipeline.fetcher.calls(), 0);
        assert_eq!(
            progress.states(),
            vec![
                PipelineState::Validating,
                PipelineState::Failed(ErrorKind::MissingField)
            ]
        );
    }

    #[tokio::test]
    async fn invalid_website_fails_before_fetch() {
        let pipeline = acme_pipeline();
        let mut raw = acme_input();
        raw["company_website"] = json!("not a url");

        let err = pipeline.run(&raw, &SilentProgress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.kind().status(), 400);
        assert_eq!(pipeline.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_site_is_scrape_failed_without_generation() {
        let pipeline = acme_pipeline();
        let mut raw = acme_input();
        raw["company_website"] = json!("https://unreachable.example");

        let err = pipeline.run(&raw, &SilentProgress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScrapeFailed);
        assert_eq!(err.kind().status(), 502);
        assert!(pipeline.generator.calls().is_empty());
    }

    #[tokio::test]
    async fn slow_fetch_times_out_naming_the_stage() {
        let pipeline = Pipeline::new(
            StaticFetcher::new(ACME_HTML).with_delay(Duration::from_secs(5)),
            ScriptedGenerator::new(GOOD_COPY_REPLY, QA_LOW_REPLY),
            PipelineConfig {
                deadline: Duration::from_millis(50),
                ..PipelineConfig::default()
            },
        );
        let progress = RecordingProgress::default();

        let err = pipeline.run(&acme_input(), &progress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.kind().status(), 504);
        assert!(err.to_string().contains("researching"), "{err}");
        assert!(pipeline.generator.calls().is_empty());
        assert_eq!(
            progress.states().last(),
            Some(&PipelineState::Failed(ErrorKind::Timeout))
        );
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let pipeline = Pipeline::new(
            StaticFetcher::new(ACME_HTML),
            ScriptedGenerator::new(GOOD_COPY_REPLY, QA_LOW_REPLY)
                .with_delay(Duration::from_secs(5)),
            PipelineConfig {
                deadline: Duration::from_millis(50),
                ..PipelineConfig::default()
            },
        );

        let err = pipeline.run(&acme_input(), &SilentProgress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("copywriting"), "{err}");
    }

    #[tokio::test]
    async fn bad_copy_never_reaches_qa() {
        let pipeline = pipeline(
            StaticFetcher::new(ACME_HTML),
            ScriptedGenerator::new(
                r#"{"subject_lines": ["Hi", "Hi", "Hello"], "primary_email": "Amazing news!", "follow_up_email": "Still there?"}"#,
                QA_LOW_REPLY,
            ),
        );

        let err = pipeline.run(&acme_input(), &SilentProgress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AgentError);
        assert_eq!(pipeline.generator.calls(), vec![GenerationTask::Copy]);
    }

    #[tokio::test]
    async fn generation_failure_is_agent_error() {
        let pipeline = pipeline(
            StaticFetcher::new(ACME_HTML),
            ScriptedGenerator::failing(),
        );

        let err = pipeline.run(&acme_input(), &SilentProgress).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AgentError);
        assert_eq!(err.kind().status(), 500);
    }

    #[tokio::test]
    async fn high_risk_is_informational() {
        let pipeline = pipeline(
            StaticFetcher::new(ACME_HTML),
            ScriptedGenerator::new(GOOD_COPY_REPLY, QA_HIGH_REPLY),
        );

        let result = pipeline.run(&acme_input(), &SilentProgress).await.unwrap();

        assert_eq!(result.spam_risk_score, SpamRisk::High);
        assert_eq!(pipeline.generator.calls().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_pipeline() {
        let pipeline = acme_pipeline();
        let mut bad = acme_input();
        bad["tone"] = json!("shouty");
        let good = acme_input();

        let (ok, err) = tokio::join!(
            pipeline.run(&good, &SilentProgress),
            pipeline.run(&bad, &SilentProgress),
        );

        assert!(ok.is_ok());
        assert_eq!(err.unwrap_err().kind(), ErrorKind::ValidationError);
        assert_eq!(pipeline.fetcher.calls(), 1);
    }
}
