pub mod settings;

pub use settings::{
    CompressionConfig, GeminiConfig, LoggingConfig, PromptsConfig, SecurityConfig, ServerConfig,
    Settings,
};
