//! Document question-answering handler
//!
//! Accepts a questions file and a document as multipart fields, indexes the
//! document once and answers every question against it.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart form accepted by `POST /qna/`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct QnaUpload {
    /// JSON file shaped like `{"questions": ["...", "..."]}`
    #[schema(value_type = String, format = Binary)]
    query_file: Vec<u8>,

    /// Document to answer from (PDF, Markdown or plain text)
    #[schema(value_type = String, format = Binary)]
    content_file: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct QueryFile {
    questions: Vec<String>,
}

/// Uploaded document as received
struct ContentFile {
    file_name: Option<String>,
    data: Bytes,
}

/// Questions from the query file; anything unreadable counts as no questions
pub fn parse_questions(raw: Option<&[u8]>) -> Vec<String> {
    let Some(raw) = raw else {
        tracing::warn!("No query_file part, treating as no questions");
        return Vec::new();
    };

    match serde_json::from_slice::<QueryFile>(raw) {
        Ok(query) => query.questions,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable query_file, treating as no questions");
            Vec::new()
        }
    }
}

/// Name for the stored upload: `document.<ext>`, keeping only a safe extension
fn stored_file_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "pdf".to_string());

    format!("document.{extension}")
}

/// Answer every question in `query_file` using `content_file`
#[utoipa::path(
    post,
    path = "/qna/",
    tag = "qna",
    request_body(content = QnaUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Answers keyed by question, in question order", body = HashMap<String, String>),
        (status = 400, description = "Missing document or blank question", body = crate::error::ApiError),
        (status = 422, description = "Document could not be loaded", body = crate::error::ApiError),
        (status = 500, description = "Indexing failed", body = crate::error::ApiError),
        (status = 502, description = "Language model call failed", body = crate::error::ApiError)
    )
)]
pub async fn qna_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Map<String, Value>>, AppError> {
    state.increment_requests();

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("qna_request", %request_id);

    answer_upload(state, multipart).instrument(span).await
}

async fn answer_upload(
    state: Arc<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Map<String, Value>>, AppError> {
    let start = Instant::now();

    let mut query: Option<Bytes> = None;
    let mut content: Option<ContentFile> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("query_file") => query = Some(field.bytes().await?),
            Some("content_file") => {
                let file_name = field.file_name().map(str::to_string);
                content = Some(ContentFile {
                    file_name,
                    data: field.bytes().await?,
                });
            }
            other => tracing::debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let content =
        content.ok_or_else(|| AppError::BadRequest("content_file is required".to_string()))?;
    let questions = parse_questions(query.as_deref());

    tracing::info!(
        questions = questions.len(),
        file_name = ?content.file_name,
        bytes = content.data.len(),
        "QnA request received"
    );

    if let Some(i) = questions.iter().position(|q| q.trim().is_empty()) {
        return Err(AppError::BadRequest(format!("Question {i} is empty")));
    }
    if questions.is_empty() {
        return Ok(Json(Map::new()));
    }

    // Removed on drop, whichever way this function exits
    let upload_dir = create_upload_dir(state.config.server.upload_dir.as_deref())?;
    let document_path: PathBuf = upload_dir
        .path()
        .join(stored_file_name(content.file_name.as_deref()));
    tokio::fs::write(&document_path, &content.data).await?;

    let records = state.pipeline.answer_all(&document_path, &questions).await?;
    state.record_answers(records.len());

    // Repeated questions keep their first position and the last answer
    let mut answers = Map::new();
    for record in records {
        answers.insert(record.question, Value::String(record.answer));
    }

    tracing::info!(
        answers = answers.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "QnA request completed"
    );

    Ok(Json(answers))
}

fn create_upload_dir(parent: Option<&Path>) -> Result<tempfile::TempDir, AppError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("qna-upload-");

    let dir = match parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}
