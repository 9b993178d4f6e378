use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use domain_ingest::{
    exception::{IngestException, IngestResult},
    model::{
        entity::UploadSession,
        vo::{Chunk, SessionId},
    },
    repository::UploadSessionRepo,
    service::{ByteStream, ChunkAssemblerService},
};
use futures::{stream, StreamExt, TryStreamExt};
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::io::{ReaderStream, StreamReader};
use typed_builder::TypedBuilder;
use uuid::Uuid;

const CHUNK_SUFFIX: &str = ".chunk";

/// Stages chunks on a local (or shared) file system under
/// `{base}/staging/{session_id}/{index}.chunk`.
#[derive(TypedBuilder, Clone)]
pub struct LocalChunkAssemblerImpl {
    #[builder(default = "staging".into(), setter(into))]
    base: PathBuf,
    session_repo: Arc<dyn UploadSessionRepo>,
}

impl LocalChunkAssemblerImpl {
    fn staging_root(&self) -> PathBuf {
        self.base.join("staging")
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.staging_root().join(session_id.as_str())
    }

    fn chunk_path(&self, session_id: &SessionId, index: u64) -> PathBuf {
        self.session_dir(session_id).join(format!("{index}{CHUNK_SUFFIX}"))
    }

    async fn load_session(&self, session_id: &SessionId) -> IngestResult<UploadSession> {
        self.session_repo
            .get(session_id)
            .await?
            .ok_or_else(|| IngestException::SessionNotFound {
                session_id: session_id.clone(),
            })
    }
}

/// Writes under a unique temporary name first, then renames over `path`, so
/// readers only ever see whole chunks.
pub(crate) async fn create_parent_and_write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{path:?} has no parent")))?;
    tokio::fs::create_dir_all(parent).await?;
    let tmp = temp_sibling(path);
    let written = async {
        let mut file = File::create(&tmp).await?;
        file.write_all(content).await?;
        file.sync_all().await
    }
    .await;
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl ChunkAssemblerService for LocalChunkAssemblerImpl {
    async fn write(&self, chunk: Chunk) -> IngestResult<()> {
        let path = self.chunk_path(&chunk.session_id, chunk.index);
        create_parent_and_write_atomic(&path, &chunk.content).await?;
        Ok(())
    }

    async fn staged_indexes(&self, session_id: &SessionId) -> IngestResult<BTreeSet<u64>> {
        let mut indexes = BTreeSet::new();
        let mut dir = match tokio::fs::read_dir(self.session_dir(session_id)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(indexes),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_suffix(CHUNK_SUFFIX))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(index) = index {
                indexes.insert(index);
            }
        }
        Ok(indexes)
    }

    async fn is_complete(&self, session_id: &SessionId) -> IngestResult<bool> {
        let session = self.load_session(session_id).await?;
        let staged = self.staged_indexes(session_id).await?;
        Ok((0..session.total_chunks).all(|i| staged.contains(&i)))
    }

    async fn assemble_ordered(&self, session_id: &SessionId) -> IngestResult<ByteStream<'static>> {
        let session = self.load_session(session_id).await?;
        let mut paths = Vec::with_capacity(session.total_chunks as usize);
        for index in 0..session.total_chunks {
            let path = self.chunk_path(session_id, index);
            if !tokio::fs::try_exists(&path).await? {
                return Err(IngestException::MissingChunk {
                    session_id: session_id.clone(),
                    index,
                });
            }
            paths.push(path);
        }
        // Files are opened one at a time as the previous one runs dry.
        let chunks = stream::iter(paths)
            .then(|path| File::open(path))
            .map_ok(ReaderStream::new)
            .try_flatten();
        Ok(Box::new(StreamReader::new(Box::pin(chunks))))
    }

    async fn cleanup(&self, session_id: &SessionId) -> IngestResult<()> {
        ignore_not_found(tokio::fs::remove_dir_all(self.session_dir(session_id)).await)?;
        Ok(())
    }

    async fn staged_sessions(&self) -> IngestResult<Vec<SessionId>> {
        let mut sessions = vec![];
        let mut dir = match tokio::fs::read_dir(self.staging_root()).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(SessionId::parse) {
                sessions.push(id);
            }
        }
        Ok(sessions)
    }
}
