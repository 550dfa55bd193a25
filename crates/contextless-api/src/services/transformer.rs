use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CompressionLevel;

/// Output of one remote call for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub summary: String,
    pub optimized_content: String,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote call timed out: {0}")]
    Timeout(String),

    #[error("remote rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("remote API key / configuration error: {0}")]
    Config(String),

    #[error("malformed remote response: {0}")]
    Malformed(String),

    #[error("remote call failed: {0}")]
    Generic(String),
}

/// Remote text-transform service: one call shortens one chunk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn transform(
        &self,
        text: &str,
        level: CompressionLevel,
    ) -> Result<ChunkResult, RemoteError>;
}
