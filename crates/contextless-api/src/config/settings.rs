use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::CompressionLevel;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub gemini: GeminiConfig,
    pub compression: CompressionConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// "development" exposes error details in responses
    pub environment: String,
    pub request_timeout_seconds: u64,
    pub body_limit_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            environment: "production".to_string(),
            request_timeout_seconds: 300,
            body_limit_bytes: 50 * 1024 * 1024,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub require_api_key: bool,
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
    /// Process-wide cap on in-flight Gemini calls
    pub max_concurrent_requests: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            max_output_tokens: 8192,
            timeout_seconds: 120,
            max_concurrent_requests: 32,
            acquire_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CompressionConfig {
    pub max_input_chars: usize,
    /// Inputs longer than this (in chars) are chunked
    pub chunking_threshold: usize,
    pub chunk_size: usize,
    pub overlap_size: usize,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 500_000,
            chunking_threshold: 15_000,
            chunk_size: 10_000,
            overlap_size: 500,
            batch_size: 10,
            batch_pause_ms: 1_000,
        }
    }
}

impl CompressionConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptsConfig {
    pub base: String,
    pub aggressive: String,
    pub balanced: String,
    pub minimal: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            base: "You are a context optimization expert. Your job is to extract ONLY the essential \
information from the provided text, removing redundancy, filler words, and unnecessary details \
while preserving all key facts, data points, and actionable information.

Rules:
- Preserve ALL important facts, numbers, names, and dates
- Remove conversational filler and repetition
- Keep technical terms and specific details
- Maintain logical flow
- Use clear, concise language"
                .to_string(),
            aggressive: "- Output should be 70-80% shorter than input\n- Be extremely concise, keep only critical information".to_string(),
            balanced: "- Output should be 60-70% shorter than input\n- Balance brevity with completeness".to_string(),
            minimal: "- Output should be 40-50% shorter than input\n- Preserve more context and detail".to_string(),
        }
    }
}

impl PromptsConfig {
    pub fn target_for(&self, level: CompressionLevel) -> &str {
        match level {
            CompressionLevel::Aggressive => &self.aggressive,
            CompressionLevel::Balanced => &self.balanced,
            CompressionLevel::Minimal => &self.minimal,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
    /// Daily rolling log files are written here when set
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,contextless_api=debug".to_string(),
            format: "json".to_string(),
            directory: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let origins = std::env::var("ALLOWED_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });
        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("gemini.api_key", std::env::var("GEMINI_API_KEY").ok())?
            .set_override_option("security.api_key", std::env::var("API_KEY").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("server.environment", environment)?
            .set_override_option("server.allowed_origins", origins)?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.compression;
        if c.chunk_size == 0 || c.batch_size == 0 || c.max_input_chars == 0 {
            bail!("compression.chunk_size, batch_size and max_input_chars must be positive");
        }
        if c.overlap_size > c.chunk_size {
            bail!(
                "compression.overlap_size ({}) must not exceed chunk_size ({})",
                c.overlap_size,
                c.chunk_size
            );
        }
        if c.chunking_threshold < c.chunk_size {
            bail!(
                "compression.chunking_threshold ({}) must be at least chunk_size ({})",
                c.chunking_threshold,
                c.chunk_size
            );
        }
        if self.gemini.max_concurrent_requests == 0 {
            bail!("gemini.max_concurrent_requests must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.compression.chunking_threshold, 15_000);
        assert_eq!(settings.compression.chunk_size, 10_000);
        assert_eq!(settings.compression.batch_pause(), Duration::from_secs(1));
    }

    #[test]
    fn test_overlap_larger_than_chunk_rejected() {
        let mut settings = Settings::default();
        settings.compression.overlap_size = settings.compression.chunk_size + 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_threshold_below_chunk_size_rejected() {
        let mut settings = Settings::default();
        settings.compression.chunking_threshold = 5_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_target_for_level() {
        let prompts = PromptsConfig::default();
        assert!(prompts.target_for(CompressionLevel::Aggressive).contains("70-80%"));
        assert!(prompts.target_for(CompressionLevel::Minimal).contains("40-50%"));
    }
}
