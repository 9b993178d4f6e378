use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_ingest::{
    exception::{IngestException, IngestResult},
    model::{
        entity::{DedupEntry, FileUploadHandle, HandleStatus, SessionStatus, UploadSession},
        vo::{
            AccessUrl, Actor, BackendKind, Chunk, ContentDigest, ContentHash, FinalizeMeta,
            HandleDeletion, InterruptedStatus, ObjectWrite, PhysicalDeletion, SessionId,
            SessionProgress, StoredObject, SweepReport, UploadMeta,
        },
    },
    repository::{FileHandleRepo, UploadSessionRepo},
    service::{
        ByteStream, ChunkAssemblerService, ContentHasherService, DedupIndexService,
        IngestionService, Registration, StorageBackend,
    },
};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::StorageBackendRegistry;

#[derive(TypedBuilder)]
pub struct IngestionServiceImpl {
    session_repo: Arc<dyn UploadSessionRepo>,
    handle_repo: Arc<dyn FileHandleRepo>,
    chunk_assembler: Arc<dyn ChunkAssemblerService>,
    content_hasher: Arc<dyn ContentHasherService>,
    dedup_index: Arc<dyn DedupIndexService>,
    backends: Arc<StorageBackendRegistry>,
    #[builder(default = 8 * 1024 * 1024)]
    max_chunk_size: u64,
    /// Idle time after which a session is expired by the sweeper.
    #[builder(default = Duration::from_secs(24 * 60 * 60))]
    session_ttl: Duration,
    /// Upper bound of one backend commit.
    #[builder(default = Duration::from_secs(10 * 60))]
    finalize_timeout: Duration,
    #[builder(default = Duration::from_millis(200))]
    finalize_poll_interval: Duration,
}

/// What the new handle is going to describe, before it has a locator.
struct HandleDraft {
    id: Uuid,
    owner_id: Uuid,
    original_filename: String,
    mime_type: String,
    backend: BackendKind,
}

impl HandleDraft {
    fn object_write(&self) -> ObjectWrite {
        ObjectWrite {
            object_id: self.id,
            original_filename: self.original_filename.to_owned(),
            mime_type: self.mime_type.to_owned(),
        }
    }
}

fn resolve_mime_type(explicit: Option<String>, original_filename: &str) -> String {
    explicit
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| mime_guess::from_path(original_filename).first_or_octet_stream().to_string())
}

fn ensure_accepts_chunks(session: &UploadSession) -> IngestResult<()> {
    match session.status {
        status if status.accepts_chunks() => Ok(()),
        SessionStatus::Assembling => Err(IngestException::FinalizeInProgress {
            session_id: session.id.clone(),
        }),
        status => Err(IngestException::SessionTerminal {
            session_id: session.id.clone(),
            status,
        }),
    }
}

impl IngestionServiceImpl {
    async fn load_owned_session(
        &self,
        actor: &Actor,
        session_id: &SessionId,
    ) -> IngestResult<UploadSession> {
        let session = self.session_repo.get(session_id).await?.ok_or_else(|| {
            IngestException::SessionNotFound {
                session_id: session_id.clone(),
            }
        })?;
        if !actor.may_act_for(session.owner_id) {
            return Err(IngestException::Forbidden {
                user_id: actor.user_id,
                owner_id: session.owner_id,
            });
        }
        Ok(session)
    }

    fn timed_out(&self, backend: BackendKind) -> IngestException {
        IngestException::BackendUnavailable {
            backend,
            source: anyhow!("Commit didn't finish within {:?}.", self.finalize_timeout),
        }
    }

    async fn completed_handle(&self, session: &UploadSession) -> IngestResult<FileUploadHandle> {
        let handle_id = session.handle_id.ok_or_else(|| {
            anyhow!("Completed session: {} carries no handle id.", session.id)
        })?;
        self.get_handle(handle_id).await
    }

    /// Drives a complete session through assembling. Only called by the
    /// winner of the `Receiving -> Assembling` transition.
    async fn run_finalize(
        &self,
        session: &UploadSession,
        meta: FinalizeMeta,
    ) -> IngestResult<FileUploadHandle> {
        let session_id = &session.id;
        info!(session_id = %session_id, backend = %session.target_backend, "Assembling upload session.");
        let committed =
            match tokio::time::timeout(self.finalize_timeout, self.commit_session(session, meta))
                .await
            {
                Ok(committed) => committed,
                Err(_) => Err(self.timed_out(session.target_backend)),
            };

        let handle = match committed {
            Ok(handle) => handle,
            Err(e) => {
                // Staged chunks are kept so that the client can finalize again.
                let next = match e {
                    IngestException::StorageExhausted { .. } => SessionStatus::Failed,
                    _ => SessionStatus::Receiving,
                };
                warn!(session_id = %session_id, error = %e, next = %next, "Finalize failed.");
                if let Err(re) = self
                    .session_repo
                    .transition(session_id, &[SessionStatus::Assembling], next, None, Utc::now())
                    .await
                {
                    warn!(session_id = %session_id, error = %re, "Failed to revert assembling session.");
                }
                return Err(e);
            }
        };

        let completed = self
            .session_repo
            .transition(
                session_id,
                &[SessionStatus::Assembling],
                SessionStatus::Completed,
                Some(handle.id),
                Utc::now(),
            )
            .await?;
        if !completed {
            // Cancelled or expired while we were committing.
            let physical = self.discard_handle(&handle).await;
            warn!(session_id = %session_id, handle_id = %handle.id, ?physical, "Session left assembling underneath finalize, handle discarded.");
            let status = self
                .session_repo
                .get(session_id)
                .await?
                .map(|s| s.status)
                .unwrap_or(SessionStatus::Cancelled);
            return Err(IngestException::SessionTerminal {
                session_id: session_id.clone(),
                status,
            });
        }

        if let Err(e) = self.chunk_assembler.cleanup(session_id).await {
            warn!(session_id = %session_id, error = %e, "Failed to clean staged chunks of completed session.");
        }
        info!(session_id = %session_id, handle_id = %handle.id, hash = %handle.content_hash, "Upload session completed.");
        Ok(handle)
    }

    async fn commit_session(
        &self,
        session: &UploadSession,
        meta: FinalizeMeta,
    ) -> IngestResult<FileUploadHandle> {
        let backend = self.backends.get(session.target_backend)?;

        // First pass: identity of the assembled content.
        let mut stream = self.chunk_assembler.assemble_ordered(&session.id).await?;
        let digest = self.content_hasher.hash_stream(&mut stream).await?;
        drop(stream);

        if digest.size != session.declared_size {
            return Err(IngestException::DeclaredSizeMismatch {
                declared_size: session.declared_size,
                detail: format!("assembled {} bytes", digest.size),
            });
        }
        if let Some(expected) = meta.expected_hash {
            if expected != digest.hash {
                return Err(IngestException::HashMismatch {
                    expected,
                    actual: digest.hash,
                });
            }
        }

        let draft = HandleDraft {
            id: Uuid::new_v4(),
            owner_id: session.owner_id,
            original_filename: session.original_filename.to_owned(),
            mime_type: resolve_mime_type(
                meta.mime_type.or_else(|| session.mime_type.to_owned()),
                &session.original_filename,
            ),
            backend: session.target_backend,
        };

        if let Some(entry) = self.dedup_index.acquire(&digest.hash, draft.backend).await? {
            debug!(session_id = %session.id, hash = %digest.hash, "Content already stored, skipping backend write.");
            return self.persist_handle(draft, entry.locator, &digest).await;
        }

        // Second pass: the actual commit. What it writes must hash the same as
        // the first pass, staged chunks can be rewritten in between.
        let mut reader = self
            .content_hasher
            .digesting(self.chunk_assembler.assemble_ordered(&session.id).await?);
        let stored = {
            let mut stream: ByteStream<'_> = Box::new(&mut reader);
            backend.write(&draft.object_write(), &mut stream).await?
        };
        let written = reader.digest();
        if written.hash != digest.hash {
            self.delete_physical(backend.as_ref(), &stored.locator).await;
            warn!(session_id = %session.id, expected = %digest.hash, actual = %written.hash, "Staged chunks changed during commit.");
            return Err(IngestException::HashMismatch {
                expected: digest.hash,
                actual: written.hash,
            });
        }
        self.check_stored(backend.as_ref(), &stored, &digest).await?;

        let locator = self.register_or_alias(backend.as_ref(), &draft, stored, &digest).await?;
        self.persist_handle(draft, locator, &digest).await
    }

    /// Rejects a write whose backend checksum disagrees with ours.
    async fn check_stored(
        &self,
        backend: &dyn StorageBackend,
        stored: &StoredObject,
        digest: &ContentDigest,
    ) -> IngestResult<()> {
        match &stored.checksum {
            Some(checksum) if *checksum != digest.hash => {
                self.delete_physical(backend, &stored.locator).await;
                Err(IngestException::HashMismatch {
                    expected: digest.hash.to_owned(),
                    actual: checksum.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Registers the freshly written object, or drops it in favour of an
    /// identical one registered concurrently. Returns the locator to use.
    async fn register_or_alias(
        &self,
        backend: &dyn StorageBackend,
        draft: &HandleDraft,
        stored: StoredObject,
        digest: &ContentDigest,
    ) -> IngestResult<String> {
        let entry = DedupEntry {
            content_hash: digest.hash.to_owned(),
            backend: draft.backend,
            handle_id: draft.id,
            locator: stored.locator.to_owned(),
            size_bytes: digest.size,
            ref_count: 1,
            created_at: Utc::now(),
        };
        match self.dedup_index.register(entry).await {
            Ok(Registration::Registered(entry)) => Ok(entry.locator),
            Ok(Registration::AlreadyPresent(existing)) => {
                debug!(hash = %digest.hash, locator = %stored.locator, "Lost dedup registration race, dropping own copy.");
                self.delete_physical(backend, &stored.locator).await;
                Ok(existing.locator)
            }
            Err(e) => {
                self.delete_physical(backend, &stored.locator).await;
                Err(e)
            }
        }
    }

    /// Inserts the handle. The dedup reference taken for it is given back
    /// if that fails.
    async fn persist_handle(
        &self,
        draft: HandleDraft,
        locator: String,
        digest: &ContentDigest,
    ) -> IngestResult<FileUploadHandle> {
        let handle = FileUploadHandle {
            id: draft.id,
            owner_id: draft.owner_id,
            locator,
            original_filename: draft.original_filename,
            mime_type: draft.mime_type,
            size_bytes: digest.size,
            content_hash: digest.hash.to_owned(),
            hash_algorithm: digest.algorithm,
            storage_backend: draft.backend,
            status: HandleStatus::Completed,
            created_at: Utc::now(),
        };
        if let Err(e) = self.handle_repo.insert(&handle).await {
            let physical = self.release_content(&handle).await;
            warn!(handle_id = %handle.id, error = %e, ?physical, "Failed to persist handle.");
            return Err(e.into());
        }
        Ok(handle)
    }

    async fn discard_handle(&self, handle: &FileUploadHandle) -> PhysicalDeletion {
        if let Err(e) = self.handle_repo.delete(handle.id).await {
            return PhysicalDeletion::Failed {
                reason: e.to_string(),
            };
        }
        self.release_content(handle).await
    }

    /// Drops the handle's dedup reference, deleting the object with the last one.
    async fn release_content(&self, handle: &FileUploadHandle) -> PhysicalDeletion {
        let remaining =
            match self.dedup_index.release(&handle.content_hash, handle.storage_backend).await {
                Ok(remaining) => remaining,
                Err(e) => {
                    warn!(handle_id = %handle.id, error = %e, "Failed to release dedup reference, object kept.");
                    return PhysicalDeletion::Failed {
                        reason: e.to_string(),
                    };
                }
            };
        match remaining {
            Some(remaining_refs) if remaining_refs > 0 => {
                PhysicalDeletion::StillReferenced { remaining_refs }
            }
            _ => match self.backends.get(handle.storage_backend) {
                Ok(backend) => self.delete_physical(backend.as_ref(), &handle.locator).await,
                Err(e) => PhysicalDeletion::Failed {
                    reason: e.to_string(),
                },
            },
        }
    }

    async fn delete_physical(&self, backend: &dyn StorageBackend, locator: &str) -> PhysicalDeletion {
        match backend.delete(locator).await {
            Ok(()) => PhysicalDeletion::Deleted,
            Err(e) => {
                warn!(backend = %backend.kind(), locator, error = %e, "Failed to delete physical object, left orphaned.");
                PhysicalDeletion::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Marks chunks that reached staging but not the mask, as left behind by
    /// a crash between the two.
    async fn reconcile_staged(&self, session: UploadSession) -> IngestResult<UploadSession> {
        if session.is_full() {
            return Ok(session);
        }
        let staged = self.chunk_assembler.staged_indexes(&session.id).await?;
        let mut reconciled = session;
        for index in staged {
            if index >= reconciled.total_chunks || reconciled.received_chunks.contains(&index) {
                continue;
            }
            debug!(session_id = %reconciled.id, index, "Reconciling staged chunk.");
            reconciled = self
                .session_repo
                .mark_received(&reconciled.id, index, Utc::now())
                .await?
                .ok_or_else(|| IngestException::SessionNotFound {
                    session_id: reconciled.id.clone(),
                })?;
        }
        Ok(reconciled)
    }

    /// Moves a live session to `to` and drops its staged chunks.
    async fn abort(&self, session: &UploadSession, to: SessionStatus) -> IngestResult<()> {
        if session.status.is_terminal() {
            if matches!(session.status, SessionStatus::Cancelled | SessionStatus::Expired) {
                self.chunk_assembler.cleanup(&session.id).await?;
            }
            debug!(session_id = %session.id, status = %session.status, "Session already terminal.");
            return Ok(());
        }
        let applied = self
            .session_repo
            .transition(
                &session.id,
                &[SessionStatus::Pending, SessionStatus::Receiving, SessionStatus::Assembling],
                to,
                None,
                Utc::now(),
            )
            .await?;
        self.chunk_assembler.cleanup(&session.id).await?;
        if applied {
            info!(session_id = %session.id, status = %to, "Upload session aborted.");
        }
        Ok(())
    }
}

#[async_trait]
impl IngestionService for IngestionServiceImpl {
    async fn upload_whole(
        &self,
        actor: &Actor,
        meta: UploadMeta,
        content: ByteStream<'_>,
    ) -> IngestResult<FileUploadHandle> {
        let kind = self.backends.select(meta.backend_hint, meta.purpose)?;
        let backend = self.backends.get(kind)?;
        let draft = HandleDraft {
            id: Uuid::new_v4(),
            owner_id: actor.user_id,
            mime_type: resolve_mime_type(meta.mime_type, &meta.original_filename),
            original_filename: meta.original_filename,
            backend: kind,
        };

        let mut reader = self.content_hasher.digesting(content);
        let written = {
            let mut stream: ByteStream<'_> = Box::new(&mut reader);
            tokio::time::timeout(self.finalize_timeout, backend.write(&draft.object_write(), &mut stream))
                .await
        };
        let stored = written.map_err(|_| self.timed_out(kind))??;
        let digest = reader.digest();

        if meta.declared_size != 0 && digest.size != meta.declared_size {
            self.delete_physical(backend.as_ref(), &stored.locator).await;
            return Err(IngestException::DeclaredSizeMismatch {
                declared_size: meta.declared_size,
                detail: format!("received {} bytes", digest.size),
            });
        }
        self.check_stored(backend.as_ref(), &stored, &digest).await?;

        let locator = self.register_or_alias(backend.as_ref(), &draft, stored, &digest).await?;
        let handle = self.persist_handle(draft, locator, &digest).await?;
        info!(handle_id = %handle.id, backend = %kind, size = handle.size_bytes, hash = %handle.content_hash, "Whole file ingested.");
        Ok(handle)
    }

    async fn initiate_chunked(
        &self,
        actor: &Actor,
        meta: UploadMeta,
        total_chunks: u64,
    ) -> IngestResult<SessionId> {
        if total_chunks == 0 {
            return Err(IngestException::InvalidTotalChunks {
                total_chunks,
                detail: "must be greater than zero".into(),
            });
        }
        if total_chunks > meta.declared_size.max(1) {
            return Err(IngestException::InvalidTotalChunks {
                total_chunks,
                detail: format!("more chunks than the {} declared bytes", meta.declared_size),
            });
        }
        let capacity = total_chunks.saturating_mul(self.max_chunk_size);
        if meta.declared_size > capacity {
            return Err(IngestException::DeclaredSizeMismatch {
                declared_size: meta.declared_size,
                detail: format!(
                    "{total_chunks} chunks of at most {} bytes hold {capacity} bytes",
                    self.max_chunk_size
                ),
            });
        }

        let backend = self.backends.select(meta.backend_hint, meta.purpose)?;
        let session = UploadSession::new(
            SessionId::generate(),
            actor.user_id,
            meta,
            total_chunks,
            backend,
            Utc::now(),
        );
        self.session_repo.insert(&session).await?;
        info!(session_id = %session.id, total_chunks, declared_size = session.declared_size, backend = %backend, "Upload session initiated.");
        Ok(session.id)
    }

    async fn receive_chunk(&self, actor: &Actor, chunk: Chunk) -> IngestResult<SessionProgress> {
        let session = self.load_owned_session(actor, &chunk.session_id).await?;
        ensure_accepts_chunks(&session)?;
        if chunk.index >= session.total_chunks {
            return Err(IngestException::ChunkIndexOutOfRange {
                session_id: session.id,
                index: chunk.index,
                total_chunks: session.total_chunks,
            });
        }
        let size = chunk.content.len() as u64;
        if size > self.max_chunk_size {
            return Err(IngestException::ChunkTooLarge {
                size,
                max_chunk_size: self.max_chunk_size,
            });
        }

        let index = chunk.index;
        self.chunk_assembler.write(chunk).await?;
        let session = self
            .session_repo
            .mark_received(&session.id, index, Utc::now())
            .await?
            .ok_or_else(|| IngestException::SessionNotFound {
                session_id: session.id.clone(),
            })?;
        // The session may have moved on while the chunk was being staged, even
        // when the index was already in the mask.
        if session.status.is_terminal() {
            if let Err(e) = self.chunk_assembler.cleanup(&session.id).await {
                warn!(session_id = %session.id, error = %e, "Failed to drop late chunk.");
            }
        }
        ensure_accepts_chunks(&session)?;
        debug!(session_id = %session.id, index, size, received = session.received_count(), total = session.total_chunks, "Chunk staged.");
        Ok(session.progress())
    }

    async fn finalize(
        &self,
        actor: &Actor,
        session_id: &SessionId,
        meta: FinalizeMeta,
    ) -> IngestResult<FileUploadHandle> {
        let deadline = Instant::now() + self.finalize_timeout;
        loop {
            let session = self.load_owned_session(actor, session_id).await?;
            match session.status {
                SessionStatus::Completed => return self.completed_handle(&session).await,
                status if status.is_terminal() => {
                    return Err(IngestException::SessionTerminal {
                        session_id: session.id,
                        status,
                    })
                }
                SessionStatus::Assembling => {
                    // Someone else is committing, wait for their outcome.
                    if Instant::now() >= deadline {
                        return Err(IngestException::FinalizeInProgress {
                            session_id: session.id,
                        });
                    }
                    tokio::time::sleep(self.finalize_poll_interval).await;
                }
                _ => {
                    let session = self.reconcile_staged(session).await?;
                    if !session.is_full() {
                        return Err(IngestException::IncompleteUpload {
                            missing: session.missing_chunks(),
                            session_id: session.id,
                        });
                    }
                    let won = self
                        .session_repo
                        .transition(
                            session_id,
                            &[SessionStatus::Pending, SessionStatus::Receiving],
                            SessionStatus::Assembling,
                            None,
                            Utc::now(),
                        )
                        .await?;
                    if won {
                        return self.run_finalize(&session, meta).await;
                    }
                }
            }
        }
    }

    async fn handle_interrupted(
        &self,
        actor: &Actor,
        session_id: &SessionId,
    ) -> IngestResult<InterruptedStatus> {
        let session = self.load_owned_session(actor, session_id).await?;
        let mut received = session.received_chunks.clone();
        if !session.status.is_terminal() {
            // Chunks staged right before a crash may not have reached the mask.
            let staged = self.chunk_assembler.staged_indexes(session_id).await?;
            received.extend(staged.into_iter().filter(|i| *i < session.total_chunks));
        }
        Ok(InterruptedStatus {
            missing_chunk_indexes: (0..session.total_chunks)
                .filter(|i| !received.contains(i))
                .collect(),
            received_count: received.len() as u64,
            session_id: session.id,
            total_chunks: session.total_chunks,
            status: session.status,
        })
    }

    async fn cancel(&self, actor: &Actor, session_id: &SessionId) -> IngestResult<()> {
        let session = self.load_owned_session(actor, session_id).await?;
        self.abort(&session, SessionStatus::Cancelled).await
    }

    async fn check_exists(
        &self,
        hash: &ContentHash,
        backend: Option<BackendKind>,
    ) -> IngestResult<Option<FileUploadHandle>> {
        let backend = backend.unwrap_or(self.backends.default_backend());
        Ok(self.handle_repo.find_by_content(hash, backend).await?)
    }

    async fn get_handle(&self, handle_id: Uuid) -> IngestResult<FileUploadHandle> {
        self.handle_repo
            .get(handle_id)
            .await?
            .ok_or(IngestException::HandleNotFound { handle_id })
    }

    async fn access_url(&self, handle_id: Uuid) -> IngestResult<AccessUrl> {
        let handle = self.get_handle(handle_id).await?;
        self.backends.get(handle.storage_backend)?.issue_access_url(&handle).await
    }

    async fn read_content(&self, handle_id: Uuid) -> IngestResult<ByteStream<'static>> {
        let handle = self.get_handle(handle_id).await?;
        self.backends.get(handle.storage_backend)?.read(&handle.locator).await
    }

    async fn verify_handle(&self, handle_id: Uuid) -> IngestResult<()> {
        let handle = self.get_handle(handle_id).await?;
        let mut content = self.backends.get(handle.storage_backend)?.read(&handle.locator).await?;
        let actual = self.content_hasher.hash_stream(&mut content).await?.hash;
        if actual != handle.content_hash {
            warn!(handle_id = %handle_id, expected = %handle.content_hash, actual = %actual, "Stored content is corrupted.");
            return Err(IngestException::HashMismatch {
                expected: handle.content_hash,
                actual,
            });
        }
        Ok(())
    }

    async fn delete_handle(&self, actor: &Actor, handle_id: Uuid) -> IngestResult<HandleDeletion> {
        let handle = self.get_handle(handle_id).await?;
        if !actor.may_act_for(handle.owner_id) {
            return Err(IngestException::Forbidden {
                user_id: actor.user_id,
                owner_id: handle.owner_id,
            });
        }
        // A concurrent delete of the same handle must not release twice.
        self.handle_repo
            .delete(handle_id)
            .await?
            .ok_or(IngestException::HandleNotFound { handle_id })?;
        let physical = self.release_content(&handle).await;
        info!(handle_id = %handle_id, ?physical, "Handle deleted.");
        Ok(HandleDeletion {
            handle_id,
            physical,
        })
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> IngestResult<SweepReport> {
        let ttl = chrono::Duration::from_std(self.session_ttl).map_err(anyhow::Error::from)?;
        let mut report = SweepReport::default();

        for session in self.session_repo.list_idle(now - ttl).await? {
            if session.status.is_terminal() {
                if let Err(e) = self.chunk_assembler.cleanup(&session.id).await {
                    warn!(session_id = %session.id, error = %e, "Failed to clean staging, keeping session record.");
                    continue;
                }
                match self.session_repo.delete(&session.id).await {
                    Ok(()) => report.purged += 1,
                    Err(e) => warn!(session_id = %session.id, error = %e, "Failed to purge session record."),
                }
            } else {
                match self.abort(&session, SessionStatus::Expired).await {
                    Ok(()) => report.expired += 1,
                    Err(e) => warn!(session_id = %session.id, error = %e, "Failed to expire session."),
                }
            }
        }

        for session_id in self.chunk_assembler.staged_sessions().await? {
            match self.session_repo.get(&session_id).await {
                Ok(Some(_)) => {}
                Ok(None) => match self.chunk_assembler.cleanup(&session_id).await {
                    Ok(()) => report.orphaned_staging += 1,
                    Err(e) => warn!(session_id = %session_id, error = %e, "Failed to clean orphaned staging."),
                },
                Err(e) => warn!(session_id = %session_id, error = %e, "Failed to look up staged session."),
            }
        }

        if report != SweepReport::default() {
            info!(?report, "Swept upload sessions.");
        }
        Ok(report)
    }
}
