mod chunk_assembler;
mod content_hasher;
mod dedup_index;
mod ingestion;
mod storage_backend;

#[rustfmt::skip]
pub use {
    chunk_assembler::ChunkAssemblerService,
    content_hasher::{ContentHasherService, DigestingReader},
    dedup_index::{DedupIndexService, Registration},
    ingestion::IngestionService,
    storage_backend::{ByteStream, StorageBackend},
};
