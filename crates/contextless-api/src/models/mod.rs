pub mod compress;

pub use compress::{CompressRequest, CompressResponse, CompressionLevel};
