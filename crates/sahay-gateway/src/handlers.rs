//! HTTP endpoint handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::ingest::{IngestError, ingest_document};
use sahay_retrieval::store::DEFAULT_TOP_K;

/// JSON error response with a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = match &err {
            IngestError::EmptyDocument | IngestError::UnsupportedFormat(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IngestError::Embedding(_) => StatusCode::BAD_GATEWAY,
            IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<sahay_storage::StorageError> for ApiError {
    fn from(err: sahay_storage::StorageError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<sahay_retrieval::store::RetrievalError> for ApiError {
    fn from(err: sahay_retrieval::store::RetrievalError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
    pub user_id: String,
    pub thread_id: String,
}

/// POST /upload?user_id=..&thread_id=.. — multipart document upload.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(scope): Query<ScopeParams>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (filename, data) = read_file_field(multipart, "file").await?;

    let outcome = ingest_document(
        &state.vectors,
        &state.translator,
        &state.embeddings,
        &state.extractor,
        &scope.user_id,
        &scope.thread_id,
        &filename,
        &data,
    )
    .await?;

    Ok(Json(json!({
        "user_id": scope.user_id,
        "thread_id": scope.thread_id,
        "doc_id": outcome.doc_id,
        "filename": outcome.filename,
        "detected_language": outcome.detected_language,
        "translated": outcome.translated,
        "chunks_added": outcome.chunks_added,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub thread_id: String,
    pub question: String,
    #[serde(default)]
    pub doc_id: Option<String>,
}

/// POST /ask — run one conversation turn.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::bad_request("Missing 'question'"));
    }

    let outcome = state
        .manager
        .ask(
            &req.user_id,
            &req.thread_id,
            &req.question,
            req.doc_id.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "user_id": req.user_id,
        "thread_id": req.thread_id,
        "memory_used": memory_map(&outcome.memory_used),
        "answer": outcome.answer,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VoiceParams {
    pub user_id: String,
    pub thread_id: String,
    #[serde(default)]
    pub doc_id: Option<String>,
}

/// POST /voice-ask?user_id=..&thread_id=.. — multipart audio question.
pub async fn voice_ask(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VoiceParams>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (_, audio, mime_type) = read_audio_field(multipart, "audio").await?;

    let question = state
        .speech
        .transcribe(audio, &mime_type)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;
    if question.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "No speech recognized in audio",
        ));
    }

    let outcome = state
        .manager
        .ask(
            &params.user_id,
            &params.thread_id,
            &question,
            params.doc_id.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "user_id": params.user_id,
        "thread_id": params.thread_id,
        "transcript": question,
        "memory_used": memory_map(&outcome.memory_used),
        "answer": outcome.answer,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub user_id: String,
    pub thread_id: String,
    pub query: String,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// POST /search — raw retrieval, no conversation mutation.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K);

    let query_vector = state
        .embeddings
        .embed_query(&req.query)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;

    let hits = state
        .vectors
        .search(
            &req.user_id,
            &req.thread_id,
            &query_vector,
            req.doc_id.as_deref(),
            top_k,
        )
        .await?;

    Ok(Json(json!({
        "user_id": req.user_id,
        "thread_id": req.thread_id,
        "doc_id_filter": req.doc_id,
        "top_k": top_k,
        "results": hits,
    })))
}

/// GET /threads/{user_id} — list a user's threads, most recent first.
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let threads = state.threads.list_threads(&user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "threads": threads })))
}

/// GET /threads/{user_id}/{thread_id} — thread summary + messages.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path((user_id, thread_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let thread = state.threads.load_thread(&user_id, &thread_id).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "thread_id": thread_id,
        "summary": thread.summary,
        "messages": thread.messages,
    })))
}

/// GET /documents/{user_id} — uploaded document registry.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let documents = state.vectors.list_documents(&user_id).await?;
    Ok(Json(json!({ "user_id": user_id, "documents": documents })))
}

/// GET /health — status + version.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn memory_map(facts: &[sahay_types::MemoryFact]) -> serde_json::Map<String, Value> {
    facts
        .iter()
        .map(|fact| (fact.key.clone(), Value::String(fact.value.clone())))
        .collect()
}

/// Pull the named file field out of a multipart body.
async fn read_file_field(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some(field_name) || field.file_name().is_some() {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            return Ok((filename, data.to_vec()));
        }
    }
    Err(ApiError::bad_request(format!(
        "Missing '{field_name}' file field"
    )))
}

/// Like `read_file_field`, also capturing the content type for transcription.
async fn read_audio_field(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(String, Vec<u8>, String), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some(field_name) || field.file_name().is_some() {
            let filename = field.file_name().unwrap_or("audio").to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("audio/ogg")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            return Ok((filename, data.to_vec(), mime_type));
        }
    }
    Err(ApiError::bad_request(format!(
        "Missing '{field_name}' audio field"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahay_types::MemoryFact;

    #[test]
    fn test_memory_map_shape() {
        let facts = vec![
            MemoryFact {
                user_id: "u1".into(),
                key: "name".into(),
                value: "Asha".into(),
            },
            MemoryFact {
                user_id: "u1".into(),
                key: "location".into(),
                value: "Pune".into(),
            },
        ];
        let map = memory_map(&facts);
        assert_eq!(map.get("name").unwrap(), "Asha");
        assert_eq!(map.get("location").unwrap(), "Pune");
    }

    #[test]
    fn test_ingest_error_status_mapping() {
        let err: ApiError = IngestError::EmptyDocument.into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = IngestError::Embedding("down".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
