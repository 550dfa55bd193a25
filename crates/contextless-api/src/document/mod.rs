pub mod chunker;

pub use chunker::{split_sentences, Chunk, TextChunker};
