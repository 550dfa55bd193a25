//! Prompt construction and response parsing for the compression call.
//!
//! The remote model is asked to answer in a `SUMMARY:` / `OPTIMIZED:` layout.
//! Everything that depends on that layout lives here.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::PromptsConfig;
use crate::models::CompressionLevel;
use crate::services::transformer::ChunkResult;

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)SUMMARY:\s*(.*?)(?:OPTIMIZED:|$)").expect("valid summary regex")
});

static OPTIMIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)OPTIMIZED:\s*(.*)$").expect("valid optimized regex"));

/// System prompt for a level: base rules plus the level's reduction target.
pub fn system_prompt(prompts: &PromptsConfig, level: CompressionLevel) -> String {
    format!("{}\n{}", prompts.base, prompts.target_for(level))
}

pub fn build_prompt(prompts: &PromptsConfig, level: CompressionLevel, text: &str) -> String {
    format!(
        "{}\n\nText to optimize:\n{}\n\nOutput format:\nSUMMARY: [2-3 sentence overview]\nOPTIMIZED: [compressed essential content only]",
        system_prompt(prompts, level),
        text
    )
}

/// Split a model answer into summary and optimized content.
///
/// Without an `OPTIMIZED:` marker the whole answer is taken as optimized
/// content and the summary is left empty.
pub fn parse_response(raw: &str) -> ChunkResult {
    let Some(optimized) = OPTIMIZED_RE.captures(raw).and_then(|c| c.get(1)) else {
        debug!(
            "Response has no OPTIMIZED marker, using raw text ({} chars)",
            raw.len()
        );
        return ChunkResult {
            summary: String::new(),
            optimized_content: raw.trim().to_string(),
        };
    };

    let summary = SUMMARY_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    ChunkResult {
        summary,
        optimized_content: optimized.as_str().trim().to_string(),
    }
}
