//! HTTP surface of the gateway.
//!
//! - `GET /hello` – Liveness greeting.
//! - `GET /embeddings` – Download the stored FAISS index as an attachment.
//! - `POST /embeddings` – Replace the stored index (multipart field `file`) after a header check.
//! - `GET /metadata` – Return the identifier → path mapping as `{ "metadata_file": {...} }`.
//! - `GET /file?file=<path>` – Return a stored document with a PDF content type.
//! - `POST /upload` – Store a document (multipart `file`, optional `prompt`), embed it through the
//!   inference Space, record it, and return `{ "answer": ... }`.
//!
//! Every route is CORS-open and unauthenticated. Handled failures are returned as
//! `{ "error": message }`.

use crate::documents::{DocumentService, GREETING, GatewayError, UploadRequest};
use crate::storage::StorageError;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Build the HTTP router, accepting request bodies up to `max_upload_bytes`.
pub fn create_router(service: Arc<DocumentService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/embeddings", get(download_index).post(upload_index))
        .route("/metadata", get(get_metadata))
        .route("/file", get(get_document))
        .route("/upload", post(upload_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn hello() -> &'static str {
    GREETING
}

/// Stream the stored index back as a binary attachment.
async fn download_index(
    State(service): State<Arc<DocumentService>>,
) -> Result<Response, AppError> {
    let bytes = service.load_index().await?;
    let file_name = service
        .paths()
        .index_file()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.bin".to_string());
    tracing::debug!(bytes = bytes.len(), "Serving index");
    Ok((
        [
            (header::CONTENT_TYPE, BINARY_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Response body for `POST /embeddings`.
#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Replace the stored index with the uploaded blob.
///
/// The blob is written first and then re-opened; a blob whose header cannot be read is left on
/// disk and reported as a server error.
async fn upload_index(
    State(service): State<Arc<DocumentService>>,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let form = read_form(multipart).await?;
    let Some(file) = form.file else {
        return Err(GatewayError::MissingInput("No file uploaded".into()).into());
    };
    tracing::info!(
        file_name = %file.file_name,
        bytes = file.bytes.len(),
        "Received index file"
    );
    let stored = service.store_index(&file.bytes).await?;
    tracing::info!(header = %stored.header, bytes = stored.bytes, "Index replaced");
    Ok(Json(MessageResponse {
        message: "File successfully uploaded",
    }))
}

async fn get_metadata(
    State(service): State<Arc<DocumentService>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let metadata = service.load_metadata().await?;
    Ok(Json(json!({ "metadata_file": metadata })))
}

#[derive(Deserialize)]
struct DocumentQuery {
    #[serde(default)]
    file: Option<String>,
}

/// Return a stored document. Paths resolving outside the uploads directory are refused.
async fn get_document(
    State(service): State<Arc<DocumentService>>,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, AppError> {
    let requested = query.file.unwrap_or_default();
    let bytes = service.read_document(&requested).await?;
    tracing::debug!(file = %requested, bytes = bytes.len(), "Serving document");
    Ok(([(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], bytes).into_response())
}

/// Response body for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    answer: serde_json::Value,
}

async fn upload_document(
    State(service): State<Arc<DocumentService>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_form(multipart).await?;
    let Some(file) = form.file else {
        return Err(GatewayError::MissingInput("No file part".into()).into());
    };
    if file.file_name.trim().is_empty() {
        return Err(GatewayError::MissingInput("No selected file".into()).into());
    }
    let outcome = service
        .upload(UploadRequest {
            file_name: file.file_name,
            bytes: file.bytes,
            prompt: form.prompt,
        })
        .await?;
    tracing::info!(
        identifier = %outcome.identifier,
        path = %outcome.stored_path.display(),
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        answer: outcome.answer,
    }))
}

struct FormFile {
    file_name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<FormFile>,
    prompt: Option<String>,
}

/// Collect the `file` and `prompt` fields; other fields are ignored.
///
/// Body read failures keep the status axum assigns them, so an oversized upload is a 413.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some(FormFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "prompt" => {
                form.prompt = Some(field.text().await?);
            }
            _ => {}
        }
    }
    Ok(form)
}

enum AppError {
    Gateway(GatewayError),
    Form(MultipartError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Form(err) => err.status(),
            Self::Gateway(GatewayError::MissingInput(_)) => StatusCode::BAD_REQUEST,
            Self::Gateway(GatewayError::Storage(err)) => match err {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::OutsideUploads(_) => StatusCode::FORBIDDEN,
                StorageError::InvalidFileName(_) | StorageError::ReservedFileName(_) => {
                    StatusCode::BAD_REQUEST
                }
                StorageError::Malformed { .. } | StorageError::Io { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Gateway(GatewayError::Remote(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Form(err) => err.body_text(),
            Self::Gateway(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(inner: GatewayError) -> Self {
        Self::Gateway(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Form(inner)
    }
}
