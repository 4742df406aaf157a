//! JSON API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::super::AppState;
use crate::repository::DocumentStatus;

/// Parameters for the document listing.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// All documents, newest first.
pub async fn api_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    match state.documents.list(params.limit).await {
        Ok(docs) => Json(docs).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// A single document record.
pub async fn api_document(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match state.documents.get(id).await {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Document not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Settings summary, memory usage and pipeline activity.
pub async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let docs = &state.documents;
    let total = docs.count().await.unwrap_or(0);
    let complete = docs
        .count_by_status(DocumentStatus::Complete)
        .await
        .unwrap_or(0);
    let pending = docs
        .count_by_status(DocumentStatus::OcrComplete)
        .await
        .unwrap_or(0);
    let failed = docs
        .count_by_status(DocumentStatus::Failed)
        .await
        .unwrap_or(0);

    let settings = &state.settings;
    Json(serde_json::json!({
        "project_name": settings.project_name,
        "ocr_model": settings.ocr_model_version,
        "reasoning_model": settings.reasoning_llm_version,
        "confidence_threshold": settings.confidence_threshold,
        "vram_limit_gb": state.memory.limit_gb(),
        "vram_usage_gb": state.memory.vram_usage_gb(),
        "device": state.memory.device(),
        "resident_models": state.memory.resident_models(),
        "pipeline_active": state.pipeline_active(),
        "data_dir": settings.data_dir.display().to_string(),
        "documents": {
            "total": total,
            "complete": complete,
            "ocr_complete": pending,
            "failed": failed,
        },
    }))
}
