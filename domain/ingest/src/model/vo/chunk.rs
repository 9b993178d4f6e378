use super::SessionId;

/// One chunk of a chunked upload.
pub struct Chunk {
    pub session_id: SessionId,
    /// Zero based index of the chunk.
    pub index: u64,
    pub content: Vec<u8>,
}
