//! Text-generation capability for the copy and QA stages.
//!
//! - [`TextGenerator`] — the async generation seam the stages depend on
//! - [`OpenRouterClient`] — OpenAI-compatible chat-completions implementation
//! - [`parse_json_reply`] — pulls a JSON object out of a chatty model reply

pub mod client;
pub mod error;
pub mod json;
pub mod ports;

pub use client::OpenRouterClient;
pub use error::GenerationError;
pub use json::{extract_json_object, parse_json_reply};
pub use ports::{Generation, GenerationRequest, GenerationTask, TextGenerator};
