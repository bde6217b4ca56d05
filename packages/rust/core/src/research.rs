//! Research stage: fetch the company site and pull personalization snippets.
//!
//! Interpretation is local. The page is stripped of chrome and candidate
//! snippets are gathered in priority order, most specific first.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use url::Url;

use outreach_shared::{OutreachError, ResearchArtifact, Result, ScraperConfig};
use outreach_web::extract::{split_sentences, truncate_chars};
use outreach_web::{FetchedPage, PageContent, PageFetcher, extract_page};

use crate::validator::MAX_PERSONALIZATION_POINTS;

/// Shortest snippet worth quoting back to the recipient.
const MIN_SNIPPET_CHARS: usize = 20;
/// Longest snippet; anything longer is a paragraph, not a fact.
const MAX_SNIPPET_CHARS: usize = 240;

/// Limits for one research pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchSettings {
    /// Snippets to keep, 1..=5.
    pub max_snippets: usize,
    /// Cap on the page excerpt handed to copywriting.
    pub max_content_chars: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_snippets: MAX_PERSONALIZATION_POINTS,
            max_content_chars: 10_000,
        }
    }
}

impl From<&ScraperConfig> for ResearchSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            max_snippets: config.max_snippets.clamp(1, MAX_PERSONALIZATION_POINTS),
            max_content_chars: config.max_content_chars,
        }
    }
}

/// Fetches a company page and turns it into a [`ResearchArtifact`].
pub struct ResearchStage<'a, F: ?Sized> {
    fetcher: &'a F,
    settings: ResearchSettings,
}

impl<'a, F: PageFetcher + ?Sized> ResearchStage<'a, F> {
    pub fn new(fetcher: &'a F, settings: ResearchSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Fetch `website` and extract research about `company_name`.
    ///
    /// Fetch failures and pages with nothing quotable both fail with
    /// `scrape_failed`. Nothing is retried.
    #[instrument(skip_all, fields(url = %website))]
    pub async fn run(&self, company_name: &str, website: &Url) -> Result<ResearchArtifact> {
        let page = self.fetcher.fetch(website).await.map_err(|e| {
            warn!(error = %e, "research fetch failed");
            OutreachError::from(e)
        })?;

        let artifact = interpret(company_name, &page, self.settings)?;

        info!(
            snippets = artifact.snippets.len(),
            excerpt_chars = artifact.page_excerpt.chars().count(),
            "research complete"
        );

        Ok(artifact)
    }
}

/// Build the artifact from a fetched page.
pub fn interpret(
    company_name: &str,
    page: &FetchedPage,
    settings: ResearchSettings,
) -> Result<ResearchArtifact> {
    let content = extract_page(&page.body);
    if content.is_empty() {
        return Err(OutreachError::ScrapeFailed(format!(
            "{}: page has no readable content",
            page.url
        )));
    }

    let snippets = collect_snippets(company_name, &content, settings.max_snippets);
    if snippets.is_empty() {
        return Err(OutreachError::ScrapeFailed(format!(
            "{}: insufficient research, no usable personalization snippets",
            page.url
        )));
    }

    let summary = content
        .description
        .clone()
        .unwrap_or_else(|| snippets[0].clone());

    Ok(ResearchArtifact {
        company_name: company_name.to_string(),
        source_url: page.url.to_string(),
        page_title: content.title.clone(),
        summary,
        snippets,
        page_excerpt: truncate_chars(&content.text, settings.max_content_chars),
    })
}

/// Gather snippets in priority order: description, `h1`, sentences that
/// name the company, `h2`, then the remaining paragraph sentences.
///
/// Pages without usable structure (text in bare `div`s, `text/plain`
/// bodies) fall back to sentences from the full visible text.
fn collect_snippets(company_name: &str, content: &PageContent, max: usize) -> Vec<String> {
    let mut picker = SnippetPicker::new(max);
    let company = company_name.to_lowercase();

    let (naming, other) = sentences_by_mention(&content.paragraphs, &company);

    if let Some(description) = &content.description {
        picker.offer_block(description);
    }
    for heading in &content.h1 {
        picker.offer(heading);
    }
    for sentence in &naming {
        picker.offer(sentence);
    }
    for heading in &content.h2 {
        picker.offer(heading);
    }
    for sentence in &other {
        picker.offer(sentence);
    }

    if picker.is_empty() {
        debug!("no structured snippets, falling back to page text");
        let (naming, other) = sentences_by_mention(std::slice::from_ref(&content.text), &company);
        for sentence in naming.iter().chain(&other) {
            picker.offer(sentence);
        }
    }

    picker.into_snippets()
}

/// Split blocks into sentences, partitioned into those that name the
/// company and the rest.
fn sentences_by_mention(blocks: &[String], company: &str) -> (Vec<String>, Vec<String>) {
    blocks
        .iter()
        .flat_map(|block| split_sentences(block))
        .partition(|s| s.to_lowercase().contains(company))
}

/// Accepts in-range, previously unseen candidates until full.
struct SnippetPicker {
    max: usize,
    seen: HashSet<String>,
    snippets: Vec<String>,
}

impl SnippetPicker {
    fn new(max: usize) -> Self {
        Self {
            max,
            seen: HashSet::new(),
            snippets: Vec::new(),
        }
    }

    fn offer(&mut self, candidate: &str) {
        if self.snippets.len() >= self.max {
            return;
        }
        let candidate = candidate.trim();
        let len = candidate.chars().count();
        if !(MIN_SNIPPET_CHARS..=MAX_SNIPPET_CHARS).contains(&len) {
            return;
        }
        if self.seen.insert(candidate.to_lowercase()) {
            self.snippets.push(candidate.to_string());
        }
    }

    /// Offer a block whole when it fits, else sentence by sentence.
    fn offer_block(&mut self, block: &str) {
        if block.chars().count() <= MAX_SNIPPET_CHARS {
            self.offer(block);
        } else {
            for sentence in split_sentences(block) {
                self.offer(&sentence);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    fn into_snippets(self) -> Vec<String> {
        self.snippets
    }
}
