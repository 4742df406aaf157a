//! Upload and reload handlers.
//!
//! Both return immediately; the pipeline runs in a background task holding
//! the workflow lock.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info, warn};

use super::super::AppState;
use crate::ocr::is_supported;
use crate::utils::format_size;

/// Reduce a client-supplied name to a bare file name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let name = name.replace('\\', "/");
    let base = Path::new(&name).file_name()?.to_string_lossy().into_owned();
    let base = base.trim();
    if base.is_empty() || base.starts_with('.') {
        return None;
    }
    Some(base.to_string())
}

/// Accept a multipart `file`, save it to the data directory and process it.
pub async fn upload_document(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = match field.file_name().and_then(sanitize_file_name) {
            Some(name) => name,
            None => return (StatusCode::BAD_REQUEST, "Missing file name").into_response(),
        };
        if !is_supported(Path::new(&file_name)) {
            return (
                StatusCode::BAD_REQUEST,
                "Unsupported file type. Upload a PDF, PNG or JPG.",
            )
                .into_response();
        }

        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Upload of {} failed: {}", file_name, e);
                return (StatusCode::BAD_REQUEST, "Failed to read upload").into_response();
            }
        };

        let dest: PathBuf = state.settings.data_dir.join(&file_name);
        if let Err(e) = tokio::fs::write(&dest, &bytes).await {
            error!("Failed to save {}: {}", dest.display(), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save upload").into_response();
        }
        info!(
            "Saved upload {} ({})",
            dest.display(),
            format_size(bytes.len() as u64)
        );

        let workflow = state.workflow.clone();
        tokio::spawn(async move {
            let workflow = workflow.lock().await;
            if let Err(e) = workflow.process(&dest).await {
                error!("Processing {} failed: {}", dest.display(), e);
            }
        });

        return Redirect::to("/").into_response();
    }

    (StatusCode::BAD_REQUEST, "No file uploaded").into_response()
}

/// Re-scan the data directory in the background.
pub async fn reload_pipeline(State(state): State<AppState>) -> Redirect {
    let ingest = state.ingest.clone();
    tokio::spawn(async move {
        match ingest.scan().await {
            Ok(summary) => info!(
                "Reload finished: {} processed, {} skipped, {} failed",
                summary.processed, summary.skipped, summary.failed
            ),
            Err(e) => error!("Reload failed: {}", e),
        }
    });
    Redirect::to("/")
}
