//! Copy stage: turn research into subject lines and two email bodies.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use outreach_llm::{GenerationRequest, GenerationTask, TextGenerator, parse_json_reply};
use outreach_shared::{CampaignRequest, DraftEmails, OutreachError, ResearchArtifact, Result, Tone};
use outreach_web::extract::collapse_whitespace;

use crate::validator::{SUBJECT_LINE_COUNT, body_violations};

const SYSTEM_PROMPT: &str = "You write short, specific B2B cold emails that read like one person \
writing to another. You reply with a single JSON object and nothing else.";

/// Register guideline sent alongside the tone name.
pub fn tone_guideline(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Formal, respectful, business-appropriate. Use proper titles.",
        Tone::Casual => "Friendly but not unprofessional. First-name basis. Conversational.",
        Tone::Founder => "Direct, founder-to-founder. Mention building/shipping. No fluff.",
    }
}

#[derive(Debug, Deserialize)]
struct CopyReply {
    subject_lines: Vec<String>,
    primary_email: String,
    follow_up_email: String,
}

/// Drafts the emails through the generation capability.
pub struct CopyStage<'a, G: ?Sized> {
    generator: &'a G,
}

impl<'a, G: TextGenerator + ?Sized> CopyStage<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    /// Generate drafts for `request` grounded in `research`.
    #[instrument(skip_all, fields(tone = %request.tone))]
    pub async fn run(
        &self,
        research: &ResearchArtifact,
        request: &CampaignRequest,
    ) -> Result<DraftEmails> {
        let generation = self
            .generator
            .generate(GenerationRequest::new(
                GenerationTask::Copy,
                SYSTEM_PROMPT,
                build_prompt(research, request),
            ))
            .await?;

        let reply: CopyReply = parse_json_reply(&generation.text, GenerationTask::Copy.as_str())?;
        let draft = check_draft(reply).inspect_err(|e| warn!(error = %e, "copy output rejected"))?;

        info!(
            model = %generation.model,
            tokens_out = generation.tokens_out,
            "copy drafted"
        );

        Ok(draft)
    }
}

/// Prompt for the copy model.
pub fn build_prompt(research: &ResearchArtifact, request: &CampaignRequest) -> String {
    let mut points = String::new();
    for (i, snippet) in research.snippets.iter().enumerate() {
        let _ = writeln!(points, "  {}. {snippet}", i + 1);
    }

    format!(
        "Write cold outreach emails based on the research provided.

CONTEXT:
- Company: {company}
- Recipient Role: {role}
- Your Product: {product}
- Goal: {goal}
- Tone: {tone} - {guideline}

RESEARCH:
- Summary: {summary}
- Page title: {title}
- Personalization points:
{points}
PAGE EXCERPT:
{excerpt}

DELIVERABLES:

1. THREE SUBJECT LINES
   - Under 50 characters each
   - No clickbait
   - Reference company or role when possible

2. PRIMARY EMAIL
   - Maximum 120 words
   - Open with a personalization point from the research
   - Connect their situation to your product
   - End with a clear call to action related to: {goal}

3. FOLLOW-UP EMAIL
   - Maximum 120 words
   - Reference the first email
   - Add a new angle, do not repeat the primary email
   - Slightly softer call to action

STRICT RULES:
- Zero emojis
- Zero exclamation marks
- No \"I hope this email finds you well\"
- No \"Just following up\"
- No \"Reaching out because\"
- The last sentence of each email is the call to action

OUTPUT FORMAT (JSON only, no markdown):
{{
    \"subject_lines\": [\"line1\", \"line2\", \"line3\"],
    \"primary_email\": \"string\",
    \"follow_up_email\": \"string\"
}}",
        company = request.company_name,
        role = request.target_role,
        product = request.product_description,
        goal = request.outreach_goal,
        tone = request.tone,
        guideline = tone_guideline(request.tone),
        summary = research.summary,
        title = research.page_title.as_deref().unwrap_or("(none)"),
        excerpt = research.page_excerpt,
    )
}

/// Enforce the draft contract. Only whitespace is trimmed; text is never
/// rewritten, so any violation fails the stage.
fn check_draft(reply: CopyReply) -> Result<DraftEmails> {
    let mut violations = Vec::new();

    let subject_lines: Vec<String> = reply
        .subject_lines
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    if subject_lines.len() != SUBJECT_LINE_COUNT {
        violations.push(format!(
            "expected {SUBJECT_LINE_COUNT} subject lines, got {}",
            subject_lines.len()
        ));
    }
    if subject_lines.iter().any(|s| s.is_empty()) {
        violations.push("subject lines must not be empty".to_string());
    }
    let distinct: HashSet<String> = subject_lines.iter().map(|s| s.to_lowercase()).collect();
    if distinct.len() != subject_lines.len() {
        violations.push("subject lines must be distinct".to_string());
    }

    let primary_email = reply.primary_email.trim().to_string();
    let follow_up_email = reply.follow_up_email.trim().to_string();
    for (label, body) in [("primary_email", &primary_email), ("follow_up_email", &follow_up_email)] {
        if body.is_empty() {
            violations.push(format!("{label}: must not be empty"));
        }
        violations.extend(body_violations(label, body));
    }
    if !primary_email.is_empty()
        && collapse_whitespace(&primary_email) == collapse_whitespace(&follow_up_email)
    {
        violations.push("follow_up_email repeats primary_email".to_string());
    }

    if !violations.is_empty() {
        return Err(OutreachError::agent(format!(
            "copy output rejected: {}",
            violations.join("; ")
        )));
    }

    let subject_lines: [String; SUBJECT_LINE_COUNT] = subject_lines
        .try_into()
        .map_err(|_| OutreachError::agent("copy output rejected: subject line count"))?;

    Ok(DraftEmails {
        subject_lines,
        primary_email,
        follow_up_email,
    })
}
