//! Core domain types for a single pipeline run.
//!
//! Every value here is request-scoped: created during one run, handed by
//! value to the next stage, and dropped when the run returns.

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Tone / SpamRisk
// ---------------------------------------------------------------------------

/// Register the generated copy should be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Founder,
}

impl Tone {
    /// All accepted tones, in display order.
    pub const ALL: [Tone; 3] = [Tone::Professional, Tone::Casual, Tone::Founder];

    /// Wire name of the tone.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Founder => "founder",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "professional" => Ok(Self::Professional),
            "casual" => Ok(Self::Casual),
            "founder" => Ok(Self::Founder),
            other => Err(format!(
                "unknown tone '{other}': expected professional, casual, or founder"
            )),
        }
    }
}

/// QA classification of how likely an email is to be filtered as spam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamRisk {
    Low,
    Medium,
    High,
}

impl SpamRisk {
    /// Wire name of the risk level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for SpamRisk {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!(
                "unknown spam risk '{s}': expected low, medium, or high"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// CampaignRequest
// ---------------------------------------------------------------------------

/// A validated inbound request. Only the input validator constructs these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRequest {
    pub company_name: String,
    pub company_website: Url,
    pub target_role: String,
    pub product_description: String,
    pub outreach_goal: String,
    pub tone: Tone,
}

// ---------------------------------------------------------------------------
// Stage artifacts
// ---------------------------------------------------------------------------

/// What ResearchStage learned about the target company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchArtifact {
    pub company_name: String,
    /// URL the content was fetched from (after redirects).
    pub source_url: String,
    /// `<title>` of the page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// Short description of the company.
    pub summary: String,
    /// Personalization snippets, most useful first. Never empty.
    pub snippets: Vec<String>,
    /// Bounded plain-text excerpt of the page for copy context.
    #[serde(skip)]
    pub page_excerpt: String,
}

/// Subject lines and bodies produced by CopyStage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftEmails {
    pub subject_lines: [String; 3],
    pub primary_email: String,
    pub follow_up_email: String,
}

/// QAStage's independent assessment of the drafts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaVerdict {
    pub risk: SpamRisk,
    pub findings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// CampaignResult
// ---------------------------------------------------------------------------

/// The final response body. Released only after output validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignResult {
    pub subject_lines: Vec<String>,
    pub primary_email: String,
    pub follow_up_email: String,
    pub personalization_points: Vec<String>,
    pub spam_risk_score: SpamRisk,
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
