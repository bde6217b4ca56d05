//! Port definitions for the generation capability.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GenerationError;

/// Which stage a generation call serves. Drives model routing and sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    Copy,
    Qa,
}

impl GenerationTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Qa => "qa",
        }
    }

    /// Sampling temperature. QA is a classification and wants stable output.
    pub fn temperature(&self) -> f32 {
        match self {
            Self::Copy => 0.7,
            Self::Qa => 0.1,
        }
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub system: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(task: GenerationTask, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task,
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

/// Text returned by the generation capability.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
}

/// Port for text-generation implementations
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a complete (non-streaming) reply.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError>;
}
