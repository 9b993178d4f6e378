use std::io;

use actix_web::{delete, get, post, web, HttpResponse};
use domain_ingest::{
    exception::IngestException,
    model::{
        entity::FileUploadHandle,
        vo::{
            AccessUrl, Chunk, ContentHash, FinalizeMeta, HandleDeletion, InterruptedStatus,
            SessionProgress, UploadMeta,
        },
    },
    service::IngestionService,
};
use futures::{channel::mpsc, SinkExt, StreamExt};
use tokio_util::io::{ReaderStream, StreamReader};

use super::{
    dtos::{ChunkQuery, ExistenceQuery, InitiateRequest, InitiateResponse},
    extract_session_id, extract_uuid, ApiError, Caller, IngestResponder, IngestResponderResult,
};

/// Upper bound of a whole file request body.
#[derive(Clone, Copy)]
pub struct WholeUploadLimit(pub u64);

#[post("/file-ingest/uploads")]
pub async fn initiate(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    data: web::Json<InitiateRequest>,
) -> IngestResponderResult<InitiateResponse> {
    let data = data.into_inner();
    let session_id = service.initiate_chunked(&actor, data.meta, data.total_chunks).await?;
    Ok(IngestResponder(InitiateResponse { session_id }))
}

#[post("/file-ingest/uploads/{id}/chunks/{index}")]
pub async fn receive_chunk(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    path: web::Path<(String, u64)>,
    query: web::Query<ChunkQuery>,
    body: web::Bytes,
) -> IngestResponderResult<SessionProgress> {
    let (id, index) = path.into_inner();
    let session_id = extract_session_id(&id)?;
    if let Some(total_chunks) = query.total_chunks {
        let status = service.handle_interrupted(&actor, &session_id).await?;
        if status.total_chunks != total_chunks {
            return Err(IngestException::InvalidTotalChunks {
                total_chunks,
                detail: format!("session was initiated with {}", status.total_chunks),
            }
            .into());
        }
    }
    let progress = service
        .receive_chunk(
            &actor,
            Chunk {
                session_id,
                index,
                content: body.to_vec(),
            },
        )
        .await?;
    Ok(IngestResponder(progress))
}

#[post("/file-ingest/uploads/{id}/finalize")]
pub async fn finalize(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    id: web::Path<String>,
    body: web::Bytes,
) -> IngestResponderResult<FileUploadHandle> {
    let session_id = extract_session_id(&id)?;
    let meta = if body.is_empty() {
        FinalizeMeta::default()
    } else {
        serde_json::from_slice::<FinalizeMeta>(&body)
            .map_err(|e| ApiError::InvalidRequest(format!("finalize metadata: {e}")))?
    };
    Ok(IngestResponder(service.finalize(&actor, &session_id, meta).await?))
}

#[get("/file-ingest/uploads/{id}/interrupted")]
pub async fn interrupted(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    id: web::Path<String>,
) -> IngestResponderResult<InterruptedStatus> {
    let session_id = extract_session_id(&id)?;
    Ok(IngestResponder(service.handle_interrupted(&actor, &session_id).await?))
}

#[delete("/file-ingest/uploads/{id}")]
pub async fn cancel(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    id: web::Path<String>,
) -> IngestResponderResult<()> {
    let session_id = extract_session_id(&id)?;
    service.cancel(&actor, &session_id).await?;
    Ok(IngestResponder(()))
}

/// Streams the request body straight into the ingestion service.
///
/// The actix payload can't leave its worker thread, so it is forwarded over a
/// channel. Body errors travel down the channel too and fail the service's
/// read, so a truncated body is never committed.
#[post("/file-ingest/whole")]
pub async fn upload_whole(
    service: web::Data<dyn IngestionService>,
    limit: web::Data<WholeUploadLimit>,
    Caller(actor): Caller,
    meta: web::Query<UploadMeta>,
    mut payload: web::Payload,
) -> IngestResponderResult<FileUploadHandle> {
    let max = limit.0;
    let (mut tx, rx) = mpsc::channel::<io::Result<web::Bytes>>(16);
    let pump = async move {
        let mut received = 0u64;
        while let Some(bytes) = payload.next().await {
            let forwarded = match bytes {
                Ok(bytes) => {
                    received += bytes.len() as u64;
                    if received > max {
                        Err(ApiError::InvalidRequest(format!("request body exceeds {max} bytes")))
                    } else {
                        Ok(bytes)
                    }
                }
                Err(e) => Err(ApiError::InvalidRequest(format!("upload aborted: {e}"))),
            };
            match forwarded {
                Ok(bytes) => {
                    if tx.send(Ok(bytes)).await.is_err() {
                        // The service stopped reading and reports why itself.
                        return Ok(());
                    }
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))
                        .await;
                    return Err(e);
                }
            }
        }
        Ok(())
    };
    let upload = service.upload_whole(&actor, meta.into_inner(), Box::new(StreamReader::new(rx)));
    let (pumped, uploaded) = tokio::join!(pump, upload);

    match (pumped, uploaded) {
        (Ok(()), uploaded) => Ok(IngestResponder(uploaded?)),
        (Err(e), Err(_)) => Err(e),
        (Err(e), Ok(handle)) => {
            // Only reachable when the service finished before the body did.
            if let Err(cleanup) = service.delete_handle(&actor, handle.id).await {
                tracing::warn!(handle_id = %handle.id, error = %cleanup, "Failed to drop truncated upload.");
            }
            Err(e)
        }
    }
}

#[get("/file-ingest/existence/{hash}")]
pub async fn existence(
    service: web::Data<dyn IngestionService>,
    _caller: Caller,
    hash: web::Path<String>,
    query: web::Query<ExistenceQuery>,
) -> IngestResponderResult<FileUploadHandle> {
    let hash = ContentHash::new(hash.as_str());
    match service.check_exists(&hash, query.backend).await? {
        Some(handle) => Ok(IngestResponder(handle)),
        None => Err(ApiError::ContentNotFound(hash)),
    }
}

#[get("/file-ingest/handles/{id}")]
pub async fn get_handle(
    service: web::Data<dyn IngestionService>,
    _caller: Caller,
    id: web::Path<String>,
) -> IngestResponderResult<FileUploadHandle> {
    let id = extract_uuid(&id)?;
    Ok(IngestResponder(service.get_handle(id).await?))
}

#[get("/file-ingest/handles/{id}/access-url")]
pub async fn access_url(
    service: web::Data<dyn IngestionService>,
    _caller: Caller,
    id: web::Path<String>,
) -> IngestResponderResult<AccessUrl> {
    let id = extract_uuid(&id)?;
    Ok(IngestResponder(service.access_url(id).await?))
}

/// Proxy read used by backends that don't hand out direct links.
#[get("/file-ingest/handles/{id}/content")]
pub async fn content(
    service: web::Data<dyn IngestionService>,
    _caller: Caller,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = extract_uuid(&id)?;
    let handle = service.get_handle(id).await?;
    let content = service.read_content(id).await?;
    Ok(HttpResponse::Ok()
        .content_type(handle.mime_type)
        .streaming(ReaderStream::new(content)))
}

#[delete("/file-ingest/handles/{id}")]
pub async fn delete_handle(
    service: web::Data<dyn IngestionService>,
    Caller(actor): Caller,
    id: web::Path<String>,
) -> IngestResponderResult<HandleDeletion> {
    let id = extract_uuid(&id)?;
    Ok(IngestResponder(service.delete_handle(&actor, id).await?))
}
