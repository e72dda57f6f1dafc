//! Write path: stream source → tokenizer → rank store

pub mod counter;
pub mod envelope;
pub mod pipeline;
pub mod source;
pub mod tokenizer;

pub use counter::IngestCounter;
pub use pipeline::{IngestPipeline, PipelineState};
pub use source::{ChannelSource, LineSource, MessageSource};
pub use tokenizer::tokenize;
