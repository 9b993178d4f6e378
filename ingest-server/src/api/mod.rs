use std::future::{ready, Ready};

use actix_web::{
    body::BoxBody, dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse,
    Responder, ResponseError,
};
use domain_ingest::{
    exception::{ErrorClass, IngestException},
    model::vo::{Actor, ContentHash, SessionId},
};
use serde::Serialize;
use uuid::Uuid;

pub mod dtos;
pub mod file_ingest;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Envelope of every json response.
#[derive(Serialize)]
pub struct ResponseBase<T> {
    pub status: i32,
    pub message: String,
    pub content: Option<T>,
}

impl<T> ResponseBase<T> {
    pub fn ok(content: T) -> Self {
        Self {
            status: 200,
            message: "Ok".to_string(),
            content: Some(content),
        }
    }

    pub fn err(status: i32, message: String) -> Self {
        Self {
            status,
            message,
            content: None,
        }
    }
}

pub struct IngestResponder<T>(pub T);

pub type IngestResponderResult<T> = Result<IngestResponder<T>, ApiError>;

impl<T: Serialize> Responder for IngestResponder<T> {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        HttpResponse::Ok().json(ResponseBase::ok(self.0))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ingest(#[from] IngestException),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Missing or malformed X-User-Id header.")]
    Unauthenticated,
    #[error("No stored content with hash: {0}.")]
    ContentNotFound(ContentHash),
}

impl ApiError {
    fn code(&self) -> i32 {
        match self {
            ApiError::Ingest(e) => e.code() as i32,
            ApiError::InvalidRequest(_) => 1,
            ApiError::Unauthenticated => 2,
            ApiError::ContentNotFound(_) => 3,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        use IngestException::*;
        let e = match self {
            ApiError::InvalidRequest(_) => return StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => return StatusCode::UNAUTHORIZED,
            ApiError::ContentNotFound(_) => return StatusCode::NOT_FOUND,
            ApiError::Ingest(e) => e,
        };
        match e {
            SessionNotFound { .. } | HandleNotFound { .. } => StatusCode::NOT_FOUND,
            Forbidden { .. } => StatusCode::FORBIDDEN,
            SessionTerminal { .. } | FinalizeInProgress { .. } | IncompleteUpload { .. } => {
                StatusCode::CONFLICT
            }
            Unsupported { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => match e.class() {
                ErrorClass::ClientInput => StatusCode::BAD_REQUEST,
                ErrorClass::Transient => StatusCode::SERVICE_UNAVAILABLE,
                ErrorClass::Integrity => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorClass::Resource => StatusCode::INSUFFICIENT_STORAGE,
                ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed.");
        }
        HttpResponse::build(status).json(ResponseBase::<()>::err(self.code(), self.to_string()))
    }
}

/// The acting user, as set by the authentication layer in front of us.
pub struct Caller(pub Actor);

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_caller(req))
    }
}

fn extract_caller(req: &HttpRequest) -> Result<Caller, ApiError> {
    let headers = req.headers();
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uuid>().ok())
        .ok_or(ApiError::Unauthenticated)?;
    let is_admin = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("admin"));
    Ok(Caller(if is_admin {
        Actor::admin(user_id)
    } else {
        Actor::user(user_id)
    }))
}

fn extract_uuid(s: &str) -> Result<Uuid, ApiError> {
    s.parse::<Uuid>()
        .map_err(|e| ApiError::InvalidRequest(format!(r#"error when parse uuid from "{s}": {e}"#)))
}

fn extract_session_id(s: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(s)
        .ok_or_else(|| ApiError::InvalidRequest(format!(r#""{s}" is not an upload session id"#)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(file_ingest::initiate)
        .service(file_ingest::receive_chunk)
        .service(file_ingest::finalize)
        .service(file_ingest::interrupted)
        .service(file_ingest::cancel)
        .service(file_ingest::upload_whole)
        .service(file_ingest::existence)
        .service(file_ingest::get_handle)
        .service(file_ingest::access_url)
        .service(file_ingest::content)
        .service(file_ingest::delete_handle);
}
