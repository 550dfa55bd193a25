use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::CompressionConfig;
use crate::document::{Chunk, TextChunker};
use crate::models::{CompressRequest, CompressResponse, CompressionLevel};
use crate::services::batch_processor::BatchProcessor;
use crate::services::transformer::TextTransformer;
use crate::utils::error::ApiError;
use crate::utils::token_estimator::{compression_ratio, estimate_tokens};

/// Request-level orchestration: validate, chunk, fan out, report stats.
#[derive(Clone)]
pub struct CompressionService {
    config: CompressionConfig,
    chunker: TextChunker,
    processor: BatchProcessor,
    expose_error_details: bool,
}

impl CompressionService {
    pub fn new(
        config: CompressionConfig,
        transformer: Arc<dyn TextTransformer>,
        expose_error_details: bool,
    ) -> Self {
        Self {
            chunker: TextChunker::new(config.chunk_size, config.overlap_size),
            processor: BatchProcessor::new(transformer, config.batch_size, config.batch_pause()),
            config,
            expose_error_details,
        }
    }

    /// Check the request before any remote call is made.
    pub fn validate(&self, request: CompressRequest) -> Result<(String, CompressionLevel), ApiError> {
        let text = match request.text {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => {
                return Err(ApiError::InvalidInput(format!(
                    "expected string, got {}",
                    json_type_name(&other)
                )))
            }
            None => return Err(ApiError::InvalidInput("missing text".to_string())),
        };

        if text.trim().is_empty() {
            return Err(ApiError::EmptyInput);
        }

        if text.chars().count() > self.config.max_input_chars {
            return Err(ApiError::TextTooLarge {
                max: self.config.max_input_chars,
            });
        }

        let level = match request.compression_level.as_deref() {
            None => CompressionLevel::default(),
            Some(raw) => raw
                .parse::<CompressionLevel>()
                .map_err(|e| ApiError::InvalidCompressionLevel(e.0))?,
        };

        Ok((text, level))
    }

    /// Inputs above the chunking threshold are split; the rest go out whole.
    pub fn plan_chunks(&self, text: &str) -> Vec<Chunk> {
        let length = text.chars().count();
        if length <= self.config.chunking_threshold {
            debug!(
                "Text under {} chars, no chunking needed",
                self.config.chunking_threshold
            );
            return vec![Chunk {
                index: 0,
                content: text.to_string(),
                overlap: None,
            }];
        }

        info!(
            "Text exceeds {} chars, chunking into {}-char chunks",
            self.config.chunking_threshold, self.config.chunk_size
        );
        let chunks = self.chunker.chunk(text);
        info!("Created {} chunks", chunks.len());
        for chunk in &chunks {
            debug!("  Chunk {}: {} characters", chunk.index + 1, chunk.char_len());
        }
        chunks
    }

    pub async fn compress(&self, request: CompressRequest) -> Result<CompressResponse, ApiError> {
        let started = Instant::now();
        let (text, level) = self.validate(request)?;

        info!(
            "Text length: {} characters, compression level: {}",
            text.chars().count(),
            level
        );

        let original_tokens = estimate_tokens(&text);
        debug!("Original tokens: {}", original_tokens);

        let chunks = self.plan_chunks(&text);
        let combined = self
            .processor
            .run(chunks, level)
            .await
            .map_err(|e| ApiError::from_remote(e, self.expose_error_details))?;

        let optimized_tokens = estimate_tokens(&combined.optimized_content);
        let ratio = compression_ratio(original_tokens, optimized_tokens);
        let processing_time = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        info!(
            "Compressed {} -> {} tokens ({}%) in {:.2}s",
            original_tokens, optimized_tokens, ratio, processing_time
        );

        Ok(CompressResponse {
            summary: combined.summary,
            optimized_content: combined.optimized_content,
            original_tokens,
            optimized_tokens,
            compression_ratio: format!("{}%", ratio),
            processing_time,
        })
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
