//! QA stage: independent spam-risk assessment of the finished drafts.
//!
//! The assessor sees only what the recipient would see. It never rewrites,
//! and a `high` verdict is reported, not acted on.

use serde::Deserialize;
use tracing::{info, instrument};

use outreach_llm::{GenerationRequest, GenerationTask, TextGenerator, parse_json_reply};
use outreach_shared::{DraftEmails, OutreachError, QaVerdict, Result, SpamRisk};

const SYSTEM_PROMPT: &str = "You audit cold emails for spam-filter and recipient-annoyance risk. \
You never suggest rewrites. You reply with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct QaReply {
    spam_risk_score: String,
    #[serde(default)]
    risk_factors: Option<Vec<String>>,
    #[serde(default)]
    analysis_notes: Option<String>,
}

pub struct QaStage<'a, G: ?Sized> {
    generator: &'a G,
}

impl<'a, G: TextGenerator + ?Sized> QaStage<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    #[instrument(skip_all)]
    pub async fn run(&self, draft: &DraftEmails) -> Result<QaVerdict> {
        let generation = self
            .generator
            .generate(GenerationRequest::new(
                GenerationTask::Qa,
                SYSTEM_PROMPT,
                build_prompt(draft),
            ))
            .await?;

        let reply: QaReply = parse_json_reply(&generation.text, GenerationTask::Qa.as_str())?;
        let verdict = into_verdict(reply)?;

        info!(
            risk = verdict.risk.as_str(),
            findings = verdict.findings.len(),
            model = %generation.model,
            "qa assessed"
        );

        Ok(verdict)
    }
}

/// Prompt for the QA model. Carries the email text and nothing else.
pub fn build_prompt(draft: &DraftEmails) -> String {
    let [first, second, third] = &draft.subject_lines;

    format!(
        "Analyze the following cold emails for spam risk.

SUBJECT LINES:
1. {first}
2. {second}
3. {third}

PRIMARY EMAIL:
{primary}

FOLLOW-UP EMAIL:
{follow_up}

SPAM RISK SIGNALS TO CHECK:

1. SALES PHRASE OVERUSE: \"revolutionary\", \"game-changing\", \"best-in-class\",
   \"act now\", \"limited time\", \"guaranteed\", \"risk-free\", value claims without proof
2. URGENCY SIGNALS: artificial deadlines, pressure tactics, FOMO language, multiple CTAs
3. PERSONALIZATION QUALITY: generic compliments, name-only personalization,
   obvious template language, mismatched tone
4. FORMAT ISSUES: ALL CAPS words, emojis, exclamation marks, excessive length

SCORING CRITERIA:
- low: 0-1 minor issues, emails feel genuine and targeted
- medium: 2-3 issues, some templated feel but acceptable
- high: 4+ issues, likely to trigger spam filters or annoy the recipient

List every risk factor found, assign a score, and add brief notes.
Do not suggest rewrites and do not comment on content quality.

OUTPUT FORMAT (JSON only, no markdown):
{{
    \"spam_risk_score\": \"low\" | \"medium\" | \"high\",
    \"risk_factors\": [\"factor1\", \"factor2\"],
    \"analysis_notes\": \"string\"
}}",
        primary = draft.primary_email,
        follow_up = draft.follow_up_email,
    )
}

fn into_verdict(reply: QaReply) -> Result<QaVerdict> {
    let risk: SpamRisk = reply
        .spam_risk_score
        .parse()
        .map_err(|e: String| OutreachError::agent(format!("qa output malformed: {e}")))?;

    let findings = reply
        .risk_factors
        .unwrap_or_default()
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    let notes = reply
        .analysis_notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(QaVerdict {
        risk,
        findings,
        notes,
    })
}
