use axum::{
    extract::{Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    models::Message,
    services::{conversation::Exchange, tabular},
    AppState,
};
use tower_http::cors::{Any, CorsLayer};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/datasets", post(upload_dataset))
        .route("/datasets/:file_id", get(dataset_details))
        .route("/datasets/:file_id/conversation", get(open_conversation))
        .route("/datasets/:file_id/messages", post(post_message))
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    file_name: String,
    content: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    file_id: String,
    file_name: String,
    columns: Vec<String>,
    row_count: usize,
    summary: String,
    suggested_questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    file_id: String,
    file_name: String,
    file_size: usize,
    columns: Vec<String>,
    row_count: usize,
    summary: String,
    suggested_questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    conversation_id: String,
    title: String,
    busy: bool,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    question: String,
}

#[axum::debug_handler]
async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    let start = std::time::Instant::now();
    tracing::info!(
        "Received upload: {} ({} bytes)",
        request.file_name,
        request.content.len()
    );

    if request.content.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File exceeds the {} byte limit",
            state.config.max_file_size
        )));
    }

    // 1. Parse the delimited file into its canonical shape
    let data = Bytes::from(request.content);
    let file_size = data.len();
    let dataset = tabular::parse_dataset(&data, &request.file_name)?;
    tracing::info!(
        "Parsed {} rows x {} columns in {:?}",
        dataset.row_count,
        dataset.columns.len(),
        start.elapsed()
    );

    // 2. Ask the model for a dataset summary
    let analysis = state.orchestrator.analyze_dataset(&dataset).await?;

    // 3. Register the dataset for later queries
    let entry = state
        .registry
        .register(&request.file_name, file_size, dataset, &analysis.summary);

    // 4. Suggest starter questions
    let questions = state
        .orchestrator
        .suggest_questions(&entry.dataset.columns, &entry.summary)
        .await?;

    tracing::info!("Upload processed in {:?}", start.elapsed());

    Ok(Json(UploadResponse {
        file_id: entry.id.clone(),
        file_name: entry.file_name.clone(),
        columns: entry.dataset.columns.clone(),
        row_count: entry.dataset.row_count,
        summary: entry.summary.clone(),
        suggested_questions: questions.questions,
    }))
}

#[axum::debug_handler]
async fn dataset_details(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<DatasetResponse>, AppError> {
    let entry = state
        .registry
        .get(&file_id)
        .ok_or_else(|| AppError::NotFound(format!("No dataset loaded for file {}", file_id)))?;

    let questions = state
        .orchestrator
        .suggest_questions(&entry.dataset.columns, &entry.summary)
        .await?;

    Ok(Json(DatasetResponse {
        file_id: entry.id.clone(),
        file_name: entry.file_name.clone(),
        file_size: entry.file_size,
        columns: entry.dataset.columns.clone(),
        row_count: entry.dataset.row_count,
        summary: entry.summary.clone(),
        suggested_questions: questions.questions,
    }))
}

#[axum::debug_handler]
async fn open_conversation(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.manager.open(&file_id).await?;
    let busy = state.manager.is_busy(&conversation.id);

    Ok(Json(ConversationResponse {
        conversation_id: conversation.id,
        title: conversation.title,
        busy,
        messages: conversation.messages,
    }))
}

#[axum::debug_handler]
async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Exchange>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::InvalidInput("Question must not be empty".to_string()));
    }

    tracing::info!("Question for file {}: {}", file_id, question);
    let exchange = state.manager.ask(&file_id, question).await?;

    Ok(Json(exchange))
}
