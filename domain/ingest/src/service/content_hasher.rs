use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::exception::IngestResult;
use crate::model::vo::{ContentDigest, ContentHash, HashAlgorithm};
use crate::service::ByteStream;

/// An [`AsyncRead`] adapter hashing everything read through it.
pub trait DigestingReader: AsyncRead + Unpin + Send {
    /// Digest of the bytes read so far.
    fn digest(&self) -> ContentDigest;
}

/// Computes the content identity used for dedup and integrity checks.
#[async_trait]
pub trait ContentHasherService: Send + Sync {
    fn algorithm(&self) -> HashAlgorithm;

    fn hash_bytes(&self, content: &[u8]) -> ContentHash;

    /// Hashes a stream in a single pass without buffering it.
    async fn hash_stream(&self, stream: &mut ByteStream<'_>) -> IngestResult<ContentDigest>;

    /// Wraps `inner` so that whoever consumes it also feeds the hasher.
    fn digesting<'a>(&self, inner: ByteStream<'a>) -> Box<dyn DigestingReader + 'a>;
}
