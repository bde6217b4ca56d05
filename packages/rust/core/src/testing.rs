//! Fake capabilities and fixtures for stage and pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use outreach_llm::{Generation, GenerationError, GenerationRequest, GenerationTask, TextGenerator};
use outreach_shared::{CampaignRequest, DraftEmails, ResearchArtifact, Tone};
use outreach_web::{FetchError, FetchedPage, PageFetcher};

use crate::pipeline::{PipelineState, ProgressReporter};

pub const ACME_HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>Acme Corp | Developer Tools</title>
  <meta name="description" content="Acme Corp builds deployment tooling for platform teams.">
</head>
<body>
  <header><nav><a href="/">Home</a><a href="/pricing">Pricing</a></nav></header>
  <main>
    <h1>Ship faster with Acme</h1>
    <p>Acme Corp raised a Series B in 2024 to expand its engineering team.</p>
    <h2>Trusted by 500 engineering teams</h2>
    <ul><li>Zero-downtime deploys for every service.</li></ul>
  </main>
  <footer><p>Copyright 2024 Acme Corp. All rights reserved.</p></footer>
</body>
</html>"#;

pub const GOOD_COPY_REPLY: &str = r#"{
  "subject_lines": ["Acme deploys, minus the pager", "Series B and release speed", "A question for Acme engineering"],
  "primary_email": "Hi Dana,\n\nCongrats on the Series B. Growing the engineering team usually means more services and more deploys to watch. We built deployment analytics that shows platform teams which releases slow them down, so they can fix the pipeline instead of guessing.\n\nWould you be open to a 15-minute demo next week?",
  "follow_up_email": "Hi Dana,\n\nOne more angle on my last note. Teams running zero-downtime deploys often find their slowest step is review, not rollout. Our dashboards make that visible in the first week.\n\nIf it helps, I can send a short walkthrough. Is a quick demo worth a slot on your calendar?"
}"#;

pub const QA_LOW_REPLY: &str =
    r#"{"spam_risk_score": "low", "risk_factors": [], "analysis_notes": "Specific and calm."}"#;

pub const QA_HIGH_REPLY: &str = r#"{"spam_risk_score": "high", "risk_factors": ["generic opener", "multiple CTAs", "value claims without proof", "urgency"]}"#;

pub fn acme_input() -> Value {
    json!({
        "company_name": "Acme Corp",
        "company_website": "https://acme.example",
        "target_role": "VP of Engineering",
        "product_description": "Deployment analytics for platform teams",
        "outreach_goal": "Book a 15-minute demo call",
        "tone": "founder"
    })
}

pub fn acme_request() -> CampaignRequest {
    CampaignRequest {
        company_name: "Acme Corp".into(),
        company_website: Url::parse("https://acme.example").unwrap(),
        target_role: "VP of Engineering".into(),
        product_description: "Deployment analytics for platform teams".into(),
        outreach_goal: "Book a 15-minute demo call".into(),
        tone: Tone::Founder,
    }
}

pub fn acme_research() -> ResearchArtifact {
    ResearchArtifact {
        company_name: "Acme Corp".into(),
        source_url: "https://acme.example/".into(),
        page_title: Some("Acme Corp | Developer Tools".into()),
        summary: "Acme Corp builds deployment tooling for platform teams.".into(),
        snippets: vec![
            "Acme Corp builds deployment tooling for platform teams.".into(),
            "Acme Corp raised a Series B in 2024 to expand its engineering team.".into(),
        ],
        page_excerpt: "Ship faster with Acme Acme Corp raised a Series B in 2024.".into(),
    }
}

pub fn acme_draft() -> DraftEmails {
    DraftEmails {
        subject_lines: [
            "Acme deploys, minus the pager".into(),
            "Series B and release speed".into(),
            "A question for Acme engineering".into(),
        ],
        primary_email: "Hi Dana, congrats on the new round. Open to a 15-minute demo?".into(),
        follow_up_email: "Hi Dana, one more idea on review time. Worth a quick call?".into(),
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Serves fixed HTML for every URL except `unreachable.example`.
pub struct StaticFetcher {
    html: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if url.host_str() == Some("unreachable.example") {
            return Err(FetchError::Connection {
                url: url.to_string(),
                reason: "dns error: no such host".into(),
            });
        }
        Ok(FetchedPage {
            url: url.clone(),
            status: 200,
            body: self.html.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Replies with canned text per task and records the order of calls.
pub struct ScriptedGenerator {
    copy_reply: Option<String>,
    qa_reply: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerationTask>>,
}

impl ScriptedGenerator {
    pub fn new(copy_reply: &str, qa_reply: &str) -> Self {
        Self {
            copy_reply: Some(copy_reply.to_string()),
            qa_reply: Some(qa_reply.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a 503.
    pub fn failing() -> Self {
        Self {
            copy_reply: None,
            qa_reply: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerationTask> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        self.calls.lock().unwrap().push(request.task);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = match request.task {
            GenerationTask::Copy => self.copy_reply.clone(),
            GenerationTask::Qa => self.qa_reply.clone(),
        };

        reply
            .map(|text| Generation {
                text,
                model: "scripted".into(),
                tokens_in: 0,
                tokens_out: 0,
                latency_ms: 0,
            })
            .ok_or_else(|| GenerationError::ServerError {
                status: 503,
                body: "upstream unavailable".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Records every state a run enters.
#[derive(Default)]
pub struct RecordingProgress {
    states: Mutex<Vec<PipelineState>>,
}

impl RecordingProgress {
    pub fn states(&self) -> Vec<PipelineState> {
        self.states.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn transition(&self, _from: PipelineState, to: PipelineState) {
        self.states.lock().unwrap().push(to);
    }
}
