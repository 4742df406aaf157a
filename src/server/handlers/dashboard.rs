//! Results dashboard.

use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
};

use super::super::template_structs::{DashboardTemplate, DocumentCard};
use super::super::AppState;

/// Main page: sidebar, upload form and one card per document.
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let documents = match state.documents.list(None).await {
        Ok(docs) => docs,
        Err(e) => {
            tracing::error!("Failed to load documents: {}", e);
            Vec::new()
        }
    };

    let threshold = state.settings.confidence_threshold;
    let cards: Vec<DocumentCard> = documents
        .iter()
        .map(|doc| DocumentCard::from_document(doc, threshold))
        .collect();

    let template = DashboardTemplate {
        title: &state.settings.project_name,
        vram_limit: format!("{:.1} GB", state.settings.vram_limit_gb),
        ocr_model: &state.settings.ocr_model_version,
        reasoning_model: &state.settings.reasoning_llm_version,
        pipeline_active: state.pipeline_active(),
        has_documents: !cards.is_empty(),
        documents: cards,
    };

    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {}", e)),
    )
}
