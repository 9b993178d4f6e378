use uuid::Uuid;

use crate::model::{
    entity::SessionStatus,
    vo::{BackendKind, ContentHash, SessionId},
};

pub type IngestResult<T> = Result<T, IngestException>;

/// Which side of the system an [`IngestException`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something wrong, retrying unchanged won't help.
    ClientInput,
    /// A backend could not be reached in time, the caller may retry.
    Transient,
    /// Bytes disagree with their digest.
    Integrity,
    /// Disk or quota exhausted.
    Resource,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestException {
    #[error("The upload session: {session_id} can't be found.")]
    SessionNotFound { session_id: SessionId },

    #[error("The upload session: {session_id} is {status} and accepts no further operation.")]
    SessionTerminal {
        session_id: SessionId,
        status: SessionStatus,
    },

    #[error("Chunk index: {index} is out of range for session: {session_id} with {total_chunks} chunks.")]
    ChunkIndexOutOfRange {
        session_id: SessionId,
        index: u64,
        total_chunks: u64,
    },

    #[error("The upload session: {session_id} still misses chunks: {missing:?}.")]
    IncompleteUpload {
        session_id: SessionId,
        missing: Vec<u64>,
    },

    #[error("Declared size: {declared_size} is inconsistent with the upload: {detail}.")]
    DeclaredSizeMismatch { declared_size: u64, detail: String },

    #[error("Total chunks: {total_chunks} is invalid: {detail}.")]
    InvalidTotalChunks { total_chunks: u64, detail: String },

    #[error("Chunk of {size} bytes exceeds max chunk size: {max_chunk_size}.")]
    ChunkTooLarge { size: u64, max_chunk_size: u64 },

    #[error("Staged chunk: {index} of session: {session_id} is missing.")]
    MissingChunk { session_id: SessionId, index: u64 },

    #[error("User: {user_id} may not act on a resource owned by: {owner_id}.")]
    Forbidden { user_id: Uuid, owner_id: Uuid },

    #[error("The file upload handle: {handle_id} can't be found.")]
    HandleNotFound { handle_id: Uuid },

    #[error("Storage backend: {backend} is not configured.")]
    BackendNotConfigured { backend: BackendKind },

    #[error("Storage backend: {backend} doesn't support {operation}.")]
    Unsupported {
        backend: BackendKind,
        operation: &'static str,
    },

    #[error("The upload session: {session_id} is being finalized by another request.")]
    FinalizeInProgress { session_id: SessionId },

    #[error("Storage backend: {backend} is unavailable: {source}")]
    BackendUnavailable {
        backend: BackendKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Content hash: {actual} is unmatched with expected hash: {expected}.")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("Storage exhausted: {source}")]
    StorageExhausted {
        #[source]
        source: anyhow::Error,
    },

    #[error("Ingest internal error: {source}")]
    InternalError {
        #[source]
        source: anyhow::Error,
    },
}

impl IngestException {
    /// Stable numeric code, independent of the message wording.
    pub fn code(&self) -> u16 {
        use IngestException::*;
        match self {
            SessionNotFound { .. } => 100,
            SessionTerminal { .. } => 101,
            ChunkIndexOutOfRange { .. } => 102,
            IncompleteUpload { .. } => 103,
            DeclaredSizeMismatch { .. } => 104,
            InvalidTotalChunks { .. } => 105,
            ChunkTooLarge { .. } => 106,
            MissingChunk { .. } => 107,
            Forbidden { .. } => 108,
            HandleNotFound { .. } => 109,
            BackendNotConfigured { .. } => 110,
            Unsupported { .. } => 111,
            FinalizeInProgress { .. } => 112,
            BackendUnavailable { .. } => 200,
            HashMismatch { .. } => 300,
            StorageExhausted { .. } => 400,
            InternalError { .. } => 500,
        }
    }

    pub fn class(&self) -> ErrorClass {
        use IngestException::*;
        match self {
            BackendUnavailable { .. } => ErrorClass::Transient,
            HashMismatch { .. } => ErrorClass::Integrity,
            StorageExhausted { .. } => ErrorClass::Resource,
            InternalError { .. } | MissingChunk { .. } => ErrorClass::Internal,
            _ => ErrorClass::ClientInput,
        }
    }

    /// Maps an io error to `StorageExhausted` when the disk or quota is full.
    pub fn from_io(e: std::io::Error) -> Self {
        // ENOSPC, EDQUOT
        if matches!(e.raw_os_error(), Some(28) | Some(122)) {
            IngestException::StorageExhausted { source: e.into() }
        } else {
            IngestException::InternalError { source: e.into() }
        }
    }
}

impl From<anyhow::Error> for IngestException {
    fn from(e: anyhow::Error) -> Self {
        IngestException::InternalError { source: e }
    }
}

impl From<std::io::Error> for IngestException {
    fn from(e: std::io::Error) -> Self {
        IngestException::from_io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_full_is_resource_error() {
        let e = IngestException::from(std::io::Error::from_raw_os_error(28));
        assert_eq!(e.class(), ErrorClass::Resource);
        assert_eq!(e.code(), 400);

        let e = IngestException::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(e.class(), ErrorClass::Internal);
    }
}
