//! Dashboard web server.
//!
//! Shows one card per processed document, accepts uploads into the data
//! directory and exposes the same records as JSON. Pipeline runs triggered
//! from the dashboard share one workflow behind a mutex, so at most one
//! document is processed at a time.

mod assets;
mod handlers;
mod routes;
mod template_structs;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Settings;
use crate::ingest::IngestPipeline;
use crate::memory::MemoryManager;
use crate::repository::{DbContext, DocumentRepository};
use crate::workflow::DocumentWorkflow;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub documents: DocumentRepository,
    pub workflow: Arc<Mutex<DocumentWorkflow>>,
    pub memory: Arc<MemoryManager>,
    pub ingest: IngestPipeline,
}

impl AppState {
    /// Build state with the real pipeline models.
    pub fn new(settings: &Settings, db: &DbContext) -> anyhow::Result<Self> {
        let workflow = DocumentWorkflow::from_settings(settings, db)?;
        Ok(Self::with_workflow(settings, db, workflow))
    }

    pub fn with_workflow(settings: &Settings, db: &DbContext, workflow: DocumentWorkflow) -> Self {
        let memory = Arc::clone(workflow.memory());
        let workflow = Arc::new(Mutex::new(workflow));
        Self {
            settings: Arc::new(settings.clone()),
            documents: db.documents(),
            ingest: IngestPipeline::new(Arc::clone(&workflow), settings.data_dir.clone()),
            workflow,
            memory,
        }
    }

    /// True while a document is going through the pipeline.
    pub fn pipeline_active(&self) -> bool {
        self.workflow.try_lock().is_err()
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, db: &DbContext, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(settings, db)?;
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting dashboard at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::agents::Flag;
    use crate::repository::{OcrInsert, ReasoningUpdate};

    async fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let settings = Settings::with_base_dir(dir.path());
        settings.ensure_directories().unwrap();

        let db = DbContext::new(&settings.database_path());
        db.init_schema().await.unwrap();

        let state = AppState::new(&settings, &db).unwrap();
        (create_router(state.clone()), state, dir)
    }

    async fn seed(state: &AppState, name: &str, score: f32) -> i32 {
        let id = state
            .documents
            .insert_ocr(&OcrInsert {
                document: &format!("/data/{}", name),
                content_hash: name,
                ocr_text: &"Tender text ".repeat(60),
                layout_json: "[]",
                ocr_confidence: None,
            })
            .await
            .unwrap();
        state
            .documents
            .complete_reasoning(
                id,
                &ReasoningUpdate {
                    agent_reasoning: "Stamp and signature present",
                    confidence_score: score,
                    flag: Some(Flag::from_score(score, 0.7)),
                    intelligence: "{}",
                },
            )
            .await
            .unwrap();
        id
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_dashboard_empty() {
        let (app, _state, _dir) = setup_test_app().await;

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("No documents processed yet. Upload a file to see results."));
        assert!(html.contains("Chandra-OCR-INT8"));
        assert!(html.contains("6.0 GB"));
    }

    #[tokio::test]
    async fn test_dashboard_cards() {
        let (app, state, _dir) = setup_test_app().await;
        seed(&state, "good.pdf", 0.91).await;
        seed(&state, "doubtful.png", 0.42).await;

        let html = body_string(app.oneshot(get("/")).await.unwrap()).await;
        assert!(html.contains("good.pdf"));
        assert!(html.contains("🟢 Green"));
        assert!(html.contains("🔴 Red"));
        assert!(html.contains("0.91"));
        assert!(html.contains("0.42"));
        assert!(html.contains("Stamp and signature present"));
        assert!(html.contains("..."));
    }

    #[tokio::test]
    async fn test_api_documents() {
        let (app, state, _dir) = setup_test_app().await;
        let id = seed(&state, "tender.pdf", 0.8).await;

        let response = app.clone().oneshot(get("/api/documents")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["flag"], "Green");
        assert_eq!(json[0]["status"], "complete");

        let response = app
            .clone()
            .oneshot(get(&format!("/api/documents/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/documents/9999")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_status() {
        let (app, state, _dir) = setup_test_app().await;
        seed(&state, "tender.pdf", 0.8).await;

        let response = app.oneshot(get("/api/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["documents"]["total"], 1);
        assert_eq!(json["documents"]["complete"], 1);
        assert_eq!(json["pipeline_active"], false);
        assert_eq!(json["vram_usage_gb"], 0.0);
        assert_eq!(json["project_name"], "Ultimate RAG");
    }

    fn multipart(filename: &str, content: &str) -> Request<Body> {
        let boundary = "docintel-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported() {
        let (app, state, _dir) = setup_test_app().await;

        let response = app.oneshot(multipart("notes.docx", "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.settings.data_dir.join("notes.docx").exists());
    }

    #[tokio::test]
    async fn test_upload_saves_into_data_dir() {
        let (app, state, _dir) = setup_test_app().await;

        let response = app
            .oneshot(multipart("../../scan.png", "not really a png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let saved = state.settings.data_dir.join("scan.png");
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "not really a png");
    }

    #[tokio::test]
    async fn test_static_css() {
        let (app, _state, _dir) = setup_test_app().await;

        let response = app.oneshot(get("/static/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap_or(""));
        assert!(content_type.unwrap_or("").contains("css"));
    }
}
