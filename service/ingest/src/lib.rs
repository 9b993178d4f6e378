mod assembler;
mod dedup;
mod hasher;
mod ingestion;
mod local_backend;
mod registry;

#[rustfmt::skip]
pub use {
    assembler::LocalChunkAssemblerImpl,
    dedup::DedupIndexServiceImpl,
    hasher::Blake3ContentHasherImpl,
    ingestion::IngestionServiceImpl,
    local_backend::LocalStorageBackendImpl,
    registry::StorageBackendRegistry,
};
