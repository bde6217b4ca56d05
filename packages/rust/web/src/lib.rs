//! Fetch capability and HTML text extraction for company research.
//!
//! This crate provides:
//! - [`PageFetcher`] — the async fetch seam the research stage depends on
//! - [`HttpFetcher`] — the reqwest-backed implementation with SSRF protection
//! - [`extract`] — chrome-stripping text extraction over a fetched document

pub mod error;
pub mod extract;
pub mod fetch;

pub use error::FetchError;
pub use extract::{PageContent, extract_page};
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
