use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use domain_ingest::{
    exception::{IngestException, IngestResult},
    memory::MemoryRepo,
    model::{
        entity::{FileUploadHandle, SessionStatus},
        vo::{
            AccessUrl, Actor, BackendKind, Chunk, ContentDigest, ContentHash, FinalizeMeta,
            HashAlgorithm, ObjectWrite, PhysicalDeletion, SessionId, StoredObject, UploadMeta,
        },
    },
    repository::{DedupIndexRepo, UploadSessionRepo},
    service::{
        ByteStream, ChunkAssemblerService, ContentHasherService, DigestingReader,
        IngestionService, StorageBackend,
    },
};
use futures::stream;
use service_ingest::{
    Blake3ContentHasherImpl, DedupIndexServiceImpl, IngestionServiceImpl, LocalChunkAssemblerImpl,
    LocalStorageBackendImpl, StorageBackendRegistry,
};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// Local backend whose writes can be switched to fail.
struct FlakyLocalBackend {
    inner: LocalStorageBackendImpl,
    failing: AtomicBool,
}

#[async_trait]
impl StorageBackend for FlakyLocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn write(
        &self,
        target: &ObjectWrite,
        content: &mut ByteStream<'_>,
    ) -> IngestResult<StoredObject> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IngestException::BackendUnavailable {
                backend: BackendKind::Local,
                source: anyhow::anyhow!("disk went away"),
            });
        }
        self.inner.write(target, content).await
    }

    async fn read(&self, locator: &str) -> IngestResult<ByteStream<'static>> {
        self.inner.read(locator).await
    }

    async fn delete(&self, locator: &str) -> IngestResult<()> {
        self.inner.delete(locator).await
    }

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl> {
        self.inner.issue_access_url(handle).await
    }
}

/// Remote drive without byte level read access.
#[derive(Default)]
struct ViewOnlyDrive {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageBackend for ViewOnlyDrive {
    fn kind(&self) -> BackendKind {
        BackendKind::ExternalDrive
    }

    async fn write(
        &self,
        _target: &ObjectWrite,
        content: &mut ByteStream<'_>,
    ) -> IngestResult<StoredObject> {
        let mut bytes = vec![];
        content.read_to_end(&mut bytes).await?;
        let remote_id = Uuid::new_v4().simple().to_string();
        let size_bytes = bytes.len() as u64;
        self.files.lock().unwrap().insert(remote_id.clone(), bytes);
        Ok(StoredObject {
            locator: remote_id,
            size_bytes,
            checksum: None,
        })
    }

    async fn read(&self, _locator: &str) -> IngestResult<ByteStream<'static>> {
        Err(IngestException::Unsupported {
            backend: BackendKind::ExternalDrive,
            operation: "read",
        })
    }

    async fn delete(&self, locator: &str) -> IngestResult<()> {
        self.files.lock().unwrap().remove(locator);
        Ok(())
    }

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl> {
        Ok(AccessUrl {
            url: format!("https://drive.example/view/{}", handle.locator),
            expires_at: None,
        })
    }
}

/// Blake3, except that it rewrites one staged chunk right after the first
/// full hash pass, the way a retransmission racing a commit would.
struct RewritingHasher {
    assembler: LocalChunkAssemblerImpl,
    rewrite: Mutex<Option<Chunk>>,
}

#[async_trait]
impl ContentHasherService for RewritingHasher {
    fn algorithm(&self) -> HashAlgorithm {
        Blake3ContentHasherImpl.algorithm()
    }

    fn hash_bytes(&self, content: &[u8]) -> ContentHash {
        Blake3ContentHasherImpl.hash_bytes(content)
    }

    async fn hash_stream(&self, stream: &mut ByteStream<'_>) -> IngestResult<ContentDigest> {
        let digest = Blake3ContentHasherImpl.hash_stream(stream).await?;
        let pending = self.rewrite.lock().unwrap().take();
        if let Some(chunk) = pending {
            self.assembler.write(chunk).await?;
        }
        Ok(digest)
    }

    fn digesting<'a>(&self, inner: ByteStream<'a>) -> Box<dyn DigestingReader + 'a> {
        Blake3ContentHasherImpl.digesting(inner)
    }
}

struct Harness {
    dir: tempfile::TempDir,
    repo: MemoryRepo,
    local: Arc<FlakyLocalBackend>,
    drive: Arc<ViewOnlyDrive>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(FlakyLocalBackend {
            inner: LocalStorageBackendImpl::builder()
                .root(dir.path().join("objects"))
                .proxy_base_url("http://localhost/file-ingest/handles")
                .content_hasher(Arc::new(Blake3ContentHasherImpl))
                .build(),
            failing: AtomicBool::new(false),
        });
        Self {
            dir,
            repo: MemoryRepo::new(),
            local,
            drive: Arc::new(ViewOnlyDrive::default()),
        }
    }

    fn objects_dir(&self) -> PathBuf {
        self.dir.path().join("objects")
    }

    fn assembler(&self) -> LocalChunkAssemblerImpl {
        LocalChunkAssemblerImpl::builder()
            .base(self.dir.path())
            .session_repo(Arc::new(self.repo.clone()))
            .build()
    }

    /// A fresh service over the same repositories and directories, as a
    /// restarted process would build it.
    fn service(&self) -> IngestionServiceImpl {
        self.service_with_hasher(Arc::new(Blake3ContentHasherImpl))
    }

    fn service_with_hasher(&self, hasher: Arc<dyn ContentHasherService>) -> IngestionServiceImpl {
        let repo = Arc::new(self.repo.clone());
        IngestionServiceImpl::builder()
            .session_repo(repo.clone())
            .handle_repo(repo.clone())
            .chunk_assembler(Arc::new(self.assembler()))
            .content_hasher(hasher)
            .dedup_index(Arc::new(DedupIndexServiceImpl::builder().repo(repo).build()))
            .backends(Arc::new(
                StorageBackendRegistry::builder()
                    .backends(vec![
                        self.local.clone() as Arc<dyn StorageBackend>,
                        self.drive.clone() as Arc<dyn StorageBackend>,
                    ])
                    .default_backend(BackendKind::Local)
                    .build(),
            ))
            .max_chunk_size(1024)
            .session_ttl(Duration::from_secs(60 * 60))
            .finalize_poll_interval(Duration::from_millis(10))
            .build()
    }

    async fn status(&self, session_id: &SessionId) -> Option<SessionStatus> {
        UploadSessionRepo::get(&self.repo, session_id).await.unwrap().map(|s| s.status)
    }
}

fn chunk(session_id: &SessionId, index: u64, content: &[u8]) -> Chunk {
    Chunk {
        session_id: session_id.clone(),
        index,
        content: content.to_vec(),
    }
}

fn hash(content: &[u8]) -> ContentHash {
    ContentHash::new(blake3::hash(content).to_string())
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .map(|e| e.unwrap().path())
        .map(|p| if p.is_dir() { count_files(&p) } else { 1 })
        .sum()
}

async fn read_all(service: &IngestionServiceImpl, handle_id: Uuid) -> Vec<u8> {
    let mut content = vec![];
    service.read_content(handle_id).await.unwrap().read_to_end(&mut content).await.unwrap();
    content
}

/// Uploads `parts` as one chunked session and finalizes it.
async fn upload_chunked(
    service: &IngestionServiceImpl,
    actor: &Actor,
    parts: &[&[u8]],
) -> FileUploadHandle {
    let size = parts.iter().map(|p| p.len() as u64).sum();
    let id = service
        .initiate_chunked(actor, UploadMeta::new("report.pdf", size), parts.len() as u64)
        .await
        .unwrap();
    for (index, part) in parts.iter().enumerate() {
        service.receive_chunk(actor, chunk(&id, index as u64, part)).await.unwrap();
    }
    service.finalize(actor, &id, FinalizeMeta::default()).await.unwrap()
}

#[tokio::test]
async fn out_of_order_chunks_resume_and_finalize() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service
        .initiate_chunked(&actor, UploadMeta::new("report.pdf", 10), 3)
        .await
        .unwrap();
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Pending));

    service.receive_chunk(&actor, chunk(&id, 1, b"bbbb")).await.unwrap();
    let progress = service.receive_chunk(&actor, chunk(&id, 0, b"aaaa")).await.unwrap();
    assert_eq!(progress.received_count, 2);
    assert_eq!(progress.status, SessionStatus::Receiving);

    let interrupted = service.handle_interrupted(&actor, &id).await.unwrap();
    assert_eq!(interrupted.missing_chunk_indexes, vec![2]);

    service.receive_chunk(&actor, chunk(&id, 2, b"cc")).await.unwrap();
    let expected_hash = ContentHash::new(blake3::hash(b"aaaabbbbcc").to_string());
    let handle = service
        .finalize(
            &actor,
            &id,
            FinalizeMeta {
                expected_hash: Some(expected_hash.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(handle.size_bytes, 10);
    assert_eq!(handle.content_hash, expected_hash);
    assert_eq!(handle.mime_type, "application/pdf");
    assert_eq!(handle.owner_id, actor.user_id);
    assert_eq!(read_all(&service, handle.id).await, b"aaaabbbbcc");
    service.verify_handle(handle.id).await.unwrap();
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Completed));
    assert!(harness.assembler().staged_indexes(&id).await.unwrap().is_empty());

    let url = service.access_url(handle.id).await.unwrap();
    assert_eq!(url.url, format!("http://localhost/file-ingest/handles/{}/content", handle.id));
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 3), 1).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"abc")).await.unwrap();
    let first = service.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    let second = service.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(count_files(&harness.objects_dir()), 1);
}

#[tokio::test]
async fn concurrent_finalize_commits_once() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();

    let (a, b) = tokio::join!(
        service.finalize(&actor, &id, FinalizeMeta::default()),
        service.finalize(&actor, &id, FinalizeMeta::default()),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(count_files(&harness.objects_dir()), 1);
}

#[tokio::test]
async fn incomplete_session_lists_missing_chunks() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 6), 3).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();
    let err = service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap();
    match err {
        IngestException::IncompleteUpload { missing, .. } => assert_eq!(missing, vec![0, 2]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Receiving));
}

#[tokio::test]
async fn retransmitted_chunk_counts_once() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
    let progress = service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
    assert_eq!(progress.received_count, 1);
    assert_eq!(progress.total_chunks, 2);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());
    let id = SessionId::generate();

    let err = service.receive_chunk(&actor, chunk(&id, 0, b"x")).await.err().unwrap();
    assert!(matches!(err, IngestException::SessionNotFound { .. }));
    let err = service.handle_interrupted(&actor, &id).await.err().unwrap();
    assert!(matches!(err, IngestException::SessionNotFound { .. }));
    let err = service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap();
    assert!(matches!(err, IngestException::SessionNotFound { .. }));
}

#[tokio::test]
async fn cancel_twice_leaves_nothing_staged() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();

    service.cancel(&actor, &id).await.unwrap();
    assert!(harness.assembler().staged_indexes(&id).await.unwrap().is_empty());
    service.cancel(&actor, &id).await.unwrap();
    assert!(harness.assembler().staged_indexes(&id).await.unwrap().is_empty());
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Cancelled));

    let err = service.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.err().unwrap();
    assert!(matches!(
        err,
        IngestException::SessionTerminal { status: SessionStatus::Cancelled, .. }
    ));
    let err = service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap();
    assert!(matches!(err, IngestException::SessionTerminal { .. }));
}

#[tokio::test]
async fn only_owner_or_admin_touches_a_session() {
    let harness = Harness::new();
    let service = harness.service();
    let owner = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&owner, UploadMeta::new("a.txt", 2), 1).await.unwrap();
    let err = service.cancel(&Actor::user(Uuid::new_v4()), &id).await.err().unwrap();
    assert!(matches!(err, IngestException::Forbidden { .. }));
    service.cancel(&Actor::admin(Uuid::new_v4()), &id).await.unwrap();
}

#[tokio::test]
async fn progress_survives_restart() {
    let harness = Harness::new();
    let actor = Actor::user(Uuid::new_v4());

    let id = {
        let before = harness.service();
        let id = before.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
        before.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
        id
    };

    let after = harness.service();
    let interrupted = after.handle_interrupted(&actor, &id).await.unwrap();
    assert_eq!(interrupted.missing_chunk_indexes, vec![1]);
    after.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();
    let handle = after.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    assert_eq!(read_all(&after, handle.id).await, b"abcd");
}

#[tokio::test]
async fn chunk_staged_before_a_crash_is_not_requested_again() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    // Staged, but the process died before the mask was updated.
    harness.assembler().write(chunk(&id, 1, b"cd")).await.unwrap();

    let interrupted = service.handle_interrupted(&actor, &id).await.unwrap();
    assert_eq!(interrupted.missing_chunk_indexes, vec![0]);
    assert_eq!(interrupted.received_count, 1);
}

#[tokio::test]
async fn finalize_picks_up_chunks_staged_before_a_crash() {
    let harness = Harness::new();
    let actor = Actor::user(Uuid::new_v4());

    let id = {
        let before = harness.service();
        let id = before.initiate_chunked(&actor, UploadMeta::new("a.txt", 6), 3).await.unwrap();
        before.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
        id
    };
    harness.assembler().write(chunk(&id, 1, b"cd")).await.unwrap();

    let after = harness.service();
    let interrupted = after.handle_interrupted(&actor, &id).await.unwrap();
    assert_eq!(interrupted.missing_chunk_indexes, vec![2]);
    for index in interrupted.missing_chunk_indexes {
        after.receive_chunk(&actor, chunk(&id, index, b"ef")).await.unwrap();
    }

    let handle = after.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    assert_eq!(handle.content_hash, hash(b"abcdef"));
    assert_eq!(read_all(&after, handle.id).await, b"abcdef");
}

#[tokio::test]
async fn chunk_rewritten_during_commit_is_not_stored_under_old_hash() {
    let harness = Harness::new();
    let actor = Actor::user(Uuid::new_v4());

    let meta = UploadMeta::new("a.txt", 4).with_backend(BackendKind::ExternalDrive);
    let id = harness.service().initiate_chunked(&actor, meta, 2).await.unwrap();
    harness.service().receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
    harness.service().receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();

    let service = harness.service_with_hasher(Arc::new(RewritingHasher {
        assembler: harness.assembler(),
        rewrite: Mutex::new(Some(chunk(&id, 0, b"XY"))),
    }));
    match service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap() {
        IngestException::HashMismatch { expected, actual } => {
            assert_eq!(expected, hash(b"abcd"));
            assert_eq!(actual, hash(b"XYcd"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.drive.files.lock().unwrap().is_empty());
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Receiving));
    let entry = DedupIndexRepo::get(&harness.repo, &hash(b"abcd"), BackendKind::ExternalDrive)
        .await
        .unwrap();
    assert!(entry.is_none());

    // The next attempt commits what is actually staged.
    let handle = service.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    assert_eq!(handle.content_hash, hash(b"XYcd"));
    let stored = harness.drive.files.lock().unwrap().get(&handle.locator).cloned().unwrap();
    assert_eq!(stored, b"XYcd");
}

#[tokio::test]
async fn retransmit_racing_finalize_commits_staged_content() {
    for _ in 0..8 {
        let harness = Harness::new();
        let service = harness.service();
        let actor = Actor::user(Uuid::new_v4());

        let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
        service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
        service.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();

        let (finalized, retransmitted) = tokio::join!(
            service.finalize(&actor, &id, FinalizeMeta::default()),
            service.receive_chunk(&actor, chunk(&id, 0, b"ab")),
        );
        match retransmitted {
            Ok(_)
            | Err(IngestException::FinalizeInProgress { .. })
            | Err(IngestException::SessionTerminal {
                status: SessionStatus::Completed,
                ..
            }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
        let handle = finalized.unwrap();
        assert_eq!(handle.content_hash, hash(b"abcd"));
        service.verify_handle(handle.id).await.unwrap();
        assert_eq!(read_all(&service, handle.id).await, b"abcd");
        assert_eq!(harness.status(&id).await, Some(SessionStatus::Completed));
    }
}

#[tokio::test]
async fn identical_content_shares_one_object() {
    let harness = Harness::new();
    let service = harness.service();
    let alice = Actor::user(Uuid::new_v4());
    let bob = Actor::user(Uuid::new_v4());

    let first = upload_chunked(&service, &alice, &[&b"same "[..], &b"bytes"[..]]).await;
    let second = upload_chunked(&service, &bob, &[&b"sam"[..], &b"e bytes"[..]]).await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.locator, second.locator);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(count_files(&harness.objects_dir()), 1);
    let entry = DedupIndexRepo::get(&harness.repo, &first.content_hash, BackendKind::Local)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.ref_count, 2);

    let found = service.check_exists(&first.content_hash, None).await.unwrap();
    assert!(found.is_some());

    let deletion = service.delete_handle(&alice, first.id).await.unwrap();
    assert_eq!(deletion.physical, PhysicalDeletion::StillReferenced { remaining_refs: 1 });
    assert_eq!(read_all(&service, second.id).await, b"same bytes");
    assert!(matches!(
        service.get_handle(first.id).await.err().unwrap(),
        IngestException::HandleNotFound { .. }
    ));

    let deletion = service.delete_handle(&bob, second.id).await.unwrap();
    assert_eq!(deletion.physical, PhysicalDeletion::Deleted);
    assert_eq!(count_files(&harness.objects_dir()), 0);
    assert!(service.check_exists(&first.content_hash, None).await.unwrap().is_none());
}

#[tokio::test]
async fn whole_upload_dedups_against_chunked() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let chunked = upload_chunked(&service, &actor, &[&b"group "[..], &b"cover"[..]]).await;
    let whole = service
        .upload_whole(&actor, UploadMeta::new("cover.png", 11), Box::new(&b"group cover"[..]))
        .await
        .unwrap();

    assert_eq!(whole.locator, chunked.locator);
    assert_eq!(whole.content_hash, chunked.content_hash);
    assert_eq!(whole.mime_type, "image/png");
    assert_eq!(count_files(&harness.objects_dir()), 1);
}

#[tokio::test]
async fn whole_upload_rejects_wrong_declared_size() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let err = service
        .upload_whole(&actor, UploadMeta::new("a.txt", 99), Box::new(&b"short"[..]))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, IngestException::DeclaredSizeMismatch { declared_size: 99, .. }));
    assert_eq!(count_files(&harness.objects_dir()), 0);
}

#[tokio::test]
async fn broken_whole_body_stores_nothing() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let body = stream::iter(vec![
        Ok(&b"first sixteen by"[..]),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ]);
    let err = service
        .upload_whole(&actor, UploadMeta::new("a.bin", 0), Box::new(StreamReader::new(body)))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, IngestException::InternalError { .. }));
    assert_eq!(count_files(&harness.objects_dir()), 0);
    assert!(service.check_exists(&hash(b"first sixteen by"), None).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_someone_elses_handle_is_forbidden() {
    let harness = Harness::new();
    let service = harness.service();
    let owner = Actor::user(Uuid::new_v4());

    let handle = upload_chunked(&service, &owner, &[&b"mine"[..]]).await;
    let err = service.delete_handle(&Actor::user(Uuid::new_v4()), handle.id).await.err().unwrap();
    assert!(matches!(err, IngestException::Forbidden { .. }));
    let deletion = service.delete_handle(&Actor::admin(Uuid::new_v4()), handle.id).await.unwrap();
    assert!(deletion.is_clean());
}

#[tokio::test]
async fn backend_failure_keeps_staged_chunks() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"ab")).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 1, b"cd")).await.unwrap();

    harness.local.failing.store(true, Ordering::SeqCst);
    let err = service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap();
    assert!(matches!(err, IngestException::BackendUnavailable { .. }));
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Receiving));
    assert_eq!(harness.assembler().staged_indexes(&id).await.unwrap().len(), 2);
    assert!(service.handle_interrupted(&actor, &id).await.unwrap().missing_chunk_indexes.is_empty());

    harness.local.failing.store(false, Ordering::SeqCst);
    let handle = service.finalize(&actor, &id, FinalizeMeta::default()).await.unwrap();
    assert_eq!(read_all(&service, handle.id).await, b"abcd");
}

#[tokio::test]
async fn integrity_checks_reject_finalize() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    // Declared ten bytes, sends nine.
    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 10), 3).await.unwrap();
    for (index, part) in [&b"aaa"[..], &b"bbb"[..], &b"ccc"[..]].into_iter().enumerate() {
        service.receive_chunk(&actor, chunk(&id, index as u64, part)).await.unwrap();
    }
    let err = service.finalize(&actor, &id, FinalizeMeta::default()).await.err().unwrap();
    assert!(matches!(err, IngestException::DeclaredSizeMismatch { declared_size: 10, .. }));
    assert_eq!(harness.status(&id).await, Some(SessionStatus::Receiving));

    let id = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 3), 1).await.unwrap();
    service.receive_chunk(&actor, chunk(&id, 0, b"abc")).await.unwrap();
    let meta = FinalizeMeta {
        expected_hash: Some(ContentHash::new(blake3::hash(b"abd").to_string())),
        ..Default::default()
    };
    let err = service.finalize(&actor, &id, meta).await.err().unwrap();
    assert!(matches!(err, IngestException::HashMismatch { .. }));
    assert_eq!(count_files(&harness.objects_dir()), 0);
}

#[tokio::test]
async fn view_only_backend_rejects_reads() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let meta = UploadMeta::new("notes.md", 5).with_backend(BackendKind::ExternalDrive);
    let handle = service.upload_whole(&actor, meta, Box::new(&b"notes"[..])).await.unwrap();
    assert_eq!(handle.storage_backend, BackendKind::ExternalDrive);

    let err = service.read_content(handle.id).await.err().unwrap();
    assert!(matches!(err, IngestException::Unsupported { operation: "read", .. }));
    let err = service.verify_handle(handle.id).await.err().unwrap();
    assert!(matches!(err, IngestException::Unsupported { .. }));

    let url = service.access_url(handle.id).await.unwrap();
    assert_eq!(url.url, format!("https://drive.example/view/{}", handle.locator));
    assert!(url.expires_at.is_none());
}

#[tokio::test]
async fn sweep_expires_then_purges() {
    let harness = Harness::new();
    let service = harness.service();
    let actor = Actor::user(Uuid::new_v4());

    let idle = service.initiate_chunked(&actor, UploadMeta::new("a.txt", 4), 2).await.unwrap();
    service.receive_chunk(&actor, chunk(&idle, 0, b"ab")).await.unwrap();
    let orphan = SessionId::generate();
    harness.assembler().write(chunk(&orphan, 0, b"lost")).await.unwrap();

    let report = service.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(report.orphaned_staging, 1);

    let later = Utc::now() + chrono::Duration::hours(2);
    let report = service.sweep_expired(later).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(harness.status(&idle).await, Some(SessionStatus::Expired));
    assert!(harness.assembler().staged_sessions().await.unwrap().is_empty());
    let err = service.receive_chunk(&actor, chunk(&idle, 1, b"cd")).await.err().unwrap();
    assert!(matches!(err, IngestException::SessionTerminal { status: SessionStatus::Expired, .. }));

    let much_later = later + chrono::Duration::hours(2);
    let report = service.sweep_expired(much_later).await.unwrap();
    assert_eq!(report.purged, 1);
    assert_eq!(harness.status(&idle).await, None);
}
