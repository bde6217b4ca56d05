//! Readable-text extraction from a fetched HTML document.
//!
//! Strips page chrome (navigation, headers, footers, scripts) and pulls out
//! the pieces research cares about: title, description, headings, and
//! paragraph text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content never counts as page text.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "svg", "iframe",
    "template",
];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static META_DESC_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"], meta[name="Description"]"#)
        .expect("valid selector")
});
static OG_DESC_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("valid selector")
});
static H1_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static H2_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("valid selector"));
static PARAGRAPH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, li, blockquote").expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Structured view of a page's readable content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// `<title>` text.
    pub title: Option<String>,
    /// Meta description, falling back to the OpenGraph description.
    pub description: Option<String>,
    /// `<h1>` texts outside page chrome.
    pub h1: Vec<String>,
    /// `<h2>` texts outside page chrome.
    pub h2: Vec<String>,
    /// Paragraph-like blocks outside page chrome, in document order.
    pub paragraphs: Vec<String>,
    /// All visible text, whitespace-collapsed.
    pub text: String,
}

impl PageContent {
    /// True when nothing readable was found.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.description.is_none()
    }
}

/// Parse `html` and extract its readable content.
pub fn extract_page(html: &str) -> PageContent {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let description = meta_content(&doc, &META_DESC_SEL).or_else(|| meta_content(&doc, &OG_DESC_SEL));

    let h1 = visible_blocks(&doc, &H1_SEL);
    let h2 = visible_blocks(&doc, &H2_SEL);
    let paragraphs = visible_blocks(&doc, &PARAGRAPH_SEL);

    let mut raw_text = String::new();
    if let Some(body) = doc.select(&BODY_SEL).next() {
        push_visible_text(body, &mut raw_text);
    }
    let text = collapse_whitespace(&raw_text);

    PageContent {
        title,
        description,
        h1,
        h2,
        paragraphs,
        text,
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Split prose into sentences on terminal punctuation.
///
/// A sentence ends only where the punctuation is followed by whitespace or
/// the end of the text, so `$12.5` and `acme.com` stay whole.
pub fn split_sentences(text: &str) -> Vec<String> {
    static BOUNDARY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.?!]+(?:\s+|$)").expect("valid regex"));

    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in BOUNDARY_RE.find_iter(text) {
        sentences.push(text[start..boundary.end()].trim());
        start = boundary.end();
    }
    sentences.push(text[start..].trim());

    sentences
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| !c.is_empty())
}

/// Text of every match of `selector` that is not nested inside page chrome.
fn visible_blocks(doc: &Html, selector: &Selector) -> Vec<String> {
    doc.select(selector)
        .filter(|el| !inside_chrome(el))
        .map(|el| {
            let mut raw = String::new();
            push_visible_text(el, &mut raw);
            collapse_whitespace(&raw)
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn inside_chrome(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CHROME_TAGS.contains(&a.value().name()))
}

fn push_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) => {
                if CHROME_TAGS.contains(&element.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}
