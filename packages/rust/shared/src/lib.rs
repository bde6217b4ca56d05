//! Shared types, error model, and configuration for the outreach pipeline.
//!
//! This crate is the foundation depended on by all other outreach crates.
//! It provides:
//! - [`OutreachError`] — the unified error type and its [`ErrorKind`] taxonomy
//! - Domain types ([`CampaignRequest`], [`ResearchArtifact`], [`DraftEmails`],
//!   [`QaVerdict`], [`CampaignResult`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OpenRouterConfig, PipelineSettings, ScraperConfig, TaskModels, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{ErrorKind, ErrorResponse, OutreachError, Result};
pub use types::{
    CampaignRequest, CampaignResult, DraftEmails, QaVerdict, ResearchArtifact, SpamRisk, Tone,
    word_count,
};
