pub mod batch_processor;
pub mod compression_service;
pub mod gemini;
pub mod prompt;
pub mod transformer;

pub use batch_processor::BatchProcessor;
pub use compression_service::CompressionService;
pub use gemini::GeminiService;
pub use transformer::{ChunkResult, RemoteError, TextTransformer};
