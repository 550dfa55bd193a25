use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How hard the remote service should shorten the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Aggressive,
    #[default]
    Balanced,
    Minimal,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Aggressive,
        CompressionLevel::Balanced,
        CompressionLevel::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Aggressive => "aggressive",
            CompressionLevel::Balanced => "balanced",
            CompressionLevel::Minimal => "minimal",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCompressionLevel(pub String);

impl FromStr for CompressionLevel {
    type Err = UnknownCompressionLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompressionLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownCompressionLevel(s.to_string()))
    }
}

/// Body of `POST /api/compress`.
///
/// `text` stays untyped so a non-string value is reported as `INVALID_INPUT`
/// instead of a generic JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompressRequest {
    #[serde(default)]
    pub text: Option<serde_json::Value>,
    #[serde(rename = "compressionLevel", default)]
    pub compression_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressResponse {
    pub summary: String,
    #[serde(rename = "optimizedContent")]
    pub optimized_content: String,
    #[serde(rename = "originalTokens")]
    pub original_tokens: usize,
    #[serde(rename = "optimizedTokens")]
    pub optimized_tokens: usize,
    /// Percentage string, e.g. "72%"
    #[serde(rename = "compressionRatio")]
    pub compression_ratio: String,
    /// Seconds, two decimals
    #[serde(rename = "processingTime")]
    pub processing_time: f64,
}
