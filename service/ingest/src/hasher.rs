use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use domain_ingest::{
    exception::IngestResult,
    model::vo::{ContentDigest, ContentHash, HashAlgorithm},
    service::{ByteStream, ContentHasherService, DigestingReader},
};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

const READ_BUF_SIZE: usize = 64 * 1024;

#[derive(Default, Clone, Copy)]
pub struct Blake3ContentHasherImpl;

#[async_trait]
impl ContentHasherService for Blake3ContentHasherImpl {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Blake3
    }

    fn hash_bytes(&self, content: &[u8]) -> ContentHash {
        ContentHash::new(blake3::hash(content).to_string())
    }

    async fn hash_stream(&self, stream: &mut ByteStream<'_>) -> IngestResult<ContentDigest> {
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0; READ_BUF_SIZE];
        let mut size = 0u64;
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }
        Ok(ContentDigest {
            hash: ContentHash::new(hasher.finalize().to_string()),
            algorithm: HashAlgorithm::Blake3,
            size,
        })
    }

    fn digesting<'a>(&self, inner: ByteStream<'a>) -> Box<dyn DigestingReader + 'a> {
        Box::new(Blake3DigestingReader {
            inner,
            hasher: blake3::Hasher::new(),
            size: 0,
        })
    }
}

struct Blake3DigestingReader<'a> {
    inner: ByteStream<'a>,
    hasher: blake3::Hasher,
    size: u64,
}

impl AsyncRead for Blake3DigestingReader<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let polled = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = polled {
            let fresh = &buf.filled()[before..];
            this.hasher.update(fresh);
            this.size += fresh.len() as u64;
        }
        polled
    }
}

impl DigestingReader for Blake3DigestingReader<'_> {
    fn digest(&self) -> ContentDigest {
        ContentDigest {
            hash: ContentHash::new(self.hasher.finalize().to_string()),
            algorithm: HashAlgorithm::Blake3,
            size: self.size,
        }
    }
}
