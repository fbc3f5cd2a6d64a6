pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod sectionize;
pub mod split;
pub mod stream;

pub use chunk::{ChunkDecoder, StreamChunk};
pub use client::{DifyClient, WorkflowStreamer};
pub use config::{ArtifactKind, Config};
pub use error::GenerationError;
pub use extract::{Extraction, ExtractionRule};
pub use pipeline::{
    generate_and_parse_document, generate_and_parse_document_with_retry,
    generate_and_split_entities, generate_and_split_entities_with_retry, RetryPolicy,
};
pub use sectionize::{sectionize, ParsedDocument, SectionKey};
pub use split::{split, Entity, EntityKind, SplitOutcome, SplitStrategy};
pub use stream::{aggregate, ByteStream, StreamState};
