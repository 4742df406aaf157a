//! Two-stage document workflow.
//!
//! Stage 1 runs OCR and records the text and layout. Stage 2 runs the vision,
//! text and fusion agents on the reasoning LLM and records the verdict. The
//! OCR model is always unloaded before the LLM loads. A fusion confidence
//! below the threshold triggers one thinking-mode retry.

mod embedding;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::agents::{Flag, FusionAgent, TextAgent, Validation, VisionAgent};
use crate::config::Settings;
use crate::llm::LlmClient;
use crate::memory::MemoryManager;
use crate::models::{
    ChandraOcrModel, ManagedModel, ModelError, OcrModel, ReasoningLlm, ReasoningModel,
};
use crate::repository::{DbContext, DieselError, DocumentRepository, OcrInsert, ReasoningUpdate};
use crate::utils::sha256_file;

pub use embedding::{truncate_embedding, Embedder};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started { path: PathBuf },
    OcrComplete { id: i32, chars: usize, pages: u32 },
    AgentComplete { agent: &'static str },
    ThinkingMode { confidence: f32 },
    Complete { id: i32, confidence: f32, flag: Flag },
    Failed { error: String },
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub id: i32,
    /// Raw output of the last fusion or thinking pass.
    pub raw_output: String,
    pub confidence: f32,
    pub flag: Flag,
    pub summary: String,
    pub thinking_used: bool,
}

/// Orchestrates OCR, the agents and persistence for one document at a time.
pub struct DocumentWorkflow {
    ocr: Arc<dyn OcrModel>,
    reasoning: Arc<dyn ReasoningModel>,
    vision_agent: VisionAgent,
    text_agent: TextAgent,
    fusion_agent: FusionAgent,
    memory: Arc<MemoryManager>,
    documents: DocumentRepository,
    embedder: Option<Embedder>,
    threshold: f32,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl DocumentWorkflow {
    /// Build the workflow with the real models described by `settings`.
    pub fn from_settings(settings: &Settings, db: &DbContext) -> Result<Self, WorkflowError> {
        let memory = MemoryManager::shared(settings.vram_limit_gb, settings.gpu_device.clone());
        let ocr = ChandraOcrModel::from_settings(settings, Arc::clone(&memory))?;
        let reasoning = ReasoningLlm::from_settings(settings, Arc::clone(&memory))?;

        let embedder = match settings.embedding_model {
            Some(ref model) => {
                let client = LlmClient::new(settings.llm.clone()).map_err(ModelError::from)?;
                Some(Embedder::new(client, model.clone(), settings.embedding_dim))
            }
            None => None,
        };

        Ok(Self::new(
            Arc::new(ocr),
            Arc::new(reasoning),
            memory,
            db.documents(),
            settings.confidence_threshold,
        )
        .with_embedder(embedder))
    }

    pub fn new(
        ocr: Arc<dyn OcrModel>,
        reasoning: Arc<dyn ReasoningModel>,
        memory: Arc<MemoryManager>,
        documents: DocumentRepository,
        threshold: f32,
    ) -> Self {
        Self {
            vision_agent: VisionAgent::new(Arc::clone(&reasoning)),
            text_agent: TextAgent::new(Arc::clone(&reasoning)),
            fusion_agent: FusionAgent::new(Arc::clone(&reasoning)),
            ocr,
            reasoning,
            memory,
            documents,
            embedder: None,
            threshold,
            events: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn documents(&self) -> &DocumentRepository {
        &self.documents
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Run the full pipeline and return the raw final model output.
    pub async fn process_document(&self, path: &Path) -> Result<String, WorkflowError> {
        Ok(self.process(path).await?.raw_output)
    }

    /// Run the full pipeline on one document.
    pub async fn process(&self, path: &Path) -> Result<WorkflowOutcome, WorkflowError> {
        info!("Starting pipeline for {}", path.display());
        self.emit(PipelineEvent::Started {
            path: path.to_path_buf(),
        })
        .await;

        let id = match self.run_ocr_stage(path).await {
            Ok(id) => id,
            Err(e) => {
                self.memory.unload_model(Some(self.ocr.as_ref())).await;
                self.emit(PipelineEvent::Failed {
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        match self.run_reasoning_stage(id, path).await {
            Ok(outcome) => {
                self.store_embedding(id).await;
                info!("Pipeline complete");
                self.emit(PipelineEvent::Complete {
                    id,
                    confidence: outcome.confidence,
                    flag: outcome.flag,
                })
                .await;
                Ok(outcome)
            }
            Err(e) => {
                self.memory.unload_model(Some(self.reasoning.as_ref())).await;
                if let Err(db_err) = self.documents.mark_failed(id, &e.to_string()).await {
                    error!("Failed to mark document {} as failed: {}", id, db_err);
                }
                self.emit(PipelineEvent::Failed {
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    /// Stage 1: OCR, insert the row, unload the OCR model.
    async fn run_ocr_stage(&self, path: &Path) -> Result<i32, WorkflowError> {
        info!("Stage 1: OCR pass with {}", self.ocr.model_id());
        let content_hash = sha256_file(path)?;
        let output = self.ocr.run(path).await?;

        let document = path.display().to_string();
        let layout_json = output.layout_json();
        let id = self
            .documents
            .insert_ocr(&OcrInsert {
                document: &document,
                content_hash: &content_hash,
                ocr_text: &output.text,
                layout_json: &layout_json,
                ocr_confidence: output.confidence,
            })
            .await?;

        self.memory.unload_model(Some(self.ocr.as_ref())).await;
        self.emit(PipelineEvent::OcrComplete {
            id,
            chars: output.text.len(),
            pages: output.page_count,
        })
        .await;
        Ok(id)
    }

    /// Stage 2: agents, optional thinking mode, update the row, unload the LLM.
    async fn run_reasoning_stage(
        &self,
        id: i32,
        path: &Path,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        info!("Stage 2: reasoning pass with {}", self.reasoning.model_id());
        let ocr_text = self
            .documents
            .get(id)
            .await?
            .map(|doc| doc.ocr_text)
            .ok_or(DieselError::NotFound)?;

        let vision = self.vision_agent.analyze_visuals(path).await?;
        self.emit(PipelineEvent::AgentComplete { agent: "vision" }).await;

        let text = self.text_agent.extract_details(&ocr_text).await?;
        self.emit(PipelineEvent::AgentComplete { agent: "text" }).await;

        let fusion_raw = self.fusion_agent.validate_and_fuse(&vision, &text).await?;
        self.emit(PipelineEvent::AgentComplete { agent: "fusion" }).await;

        let (mut validation, mut confidence) = match Validation::parse(&fusion_raw) {
            Ok(v) => {
                let confidence = v.confidence_score.unwrap_or(0.0);
                (v, confidence)
            }
            Err(e) => {
                warn!("Fusion output could not be parsed: {}", e);
                (Validation::parse_error(), 0.5)
            }
        };

        let mut raw_output = fusion_raw;
        let mut thinking_used = false;
        if confidence < self.threshold {
            warn!(
                "Low confidence ({:.2}). Triggering thinking mode...",
                confidence
            );
            self.emit(PipelineEvent::ThinkingMode { confidence }).await;

            let thinking_raw = self.fusion_agent.rethink(&vision, &text, path).await?;
            match Validation::parse(&thinking_raw) {
                Ok(v) => {
                    confidence = v.confidence_score.unwrap_or(confidence);
                    validation = v;
                }
                Err(_) => validation = Validation::unstructured(&thinking_raw),
            }
            raw_output = thinking_raw;
            thinking_used = true;
        }

        let flag = validation
            .flag
            .unwrap_or_else(|| Flag::from_score(confidence, self.threshold));
        let summary = validation
            .summary
            .clone()
            .unwrap_or_else(|| raw_output.clone());

        self.documents
            .complete_reasoning(
                id,
                &ReasoningUpdate {
                    agent_reasoning: &summary,
                    confidence_score: confidence,
                    flag: Some(flag),
                    intelligence: &raw_output,
                },
            )
            .await?;

        self.memory.unload_model(Some(self.reasoning.as_ref())).await;

        Ok(WorkflowOutcome {
            id,
            raw_output,
            confidence,
            flag,
            summary,
            thinking_used,
        })
    }

    /// Embed the OCR text if an embedding model is configured. Failures are logged.
    async fn store_embedding(&self, id: i32) {
        let Some(ref embedder) = self.embedder else {
            return;
        };
        let text = match self.documents.get(id).await {
            Ok(Some(doc)) if !doc.ocr_text.trim().is_empty() => doc.ocr_text,
            Ok(_) => return,
            Err(e) => {
                warn!("Could not load document {} for embedding: {}", id, e);
                return;
            }
        };
        match embedder.embed(&text).await {
            Ok(vector) => {
                if let Err(e) = self.documents.set_embedding(id, &vector).await {
                    warn!("Failed to store embedding for {}: {}", id, e);
                }
            }
            Err(e) => warn!("Embedding with {} failed: {}", embedder.model(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{LayoutBlock, OcrOutput};
    use crate::repository::DocumentStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeOcr {
        memory: Arc<MemoryManager>,
        loaded: AtomicBool,
    }

    #[async_trait]
    impl ManagedModel for FakeOcr {
        fn model_id(&self) -> &str {
            "fake-ocr"
        }
        fn footprint_gb(&self) -> f64 {
            2.5
        }
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }
        async fn load(&self) -> Result<(), ModelError> {
            self.memory.reserve("fake-ocr", 2.5)?;
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn unload(&self) -> Result<(), ModelError> {
            self.memory.release("fake-ocr");
            self.loaded.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl OcrModel for FakeOcr {
        async fn run(&self, _path: &Path) -> Result<OcrOutput, ModelError> {
            self.load().await?;
            Ok(OcrOutput {
                text: "# Road Tender\n\nBudget: 2,000,000 EUR".to_string(),
                layout: vec![LayoutBlock {
                    page: 1,
                    block: 1,
                    bbox: None,
                    lines: 3,
                    text: "# Road Tender".to_string(),
                    confidence: Some(0.9),
                }],
                confidence: Some(0.9),
                page_count: 1,
            })
        }
    }

    /// Replays scripted answers and records every call.
    struct ScriptedLlm {
        memory: Arc<MemoryManager>,
        loaded: AtomicBool,
        answers: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<Vec<(String, Option<PathBuf>)>>,
    }

    impl ScriptedLlm {
        fn prompts(&self) -> Vec<(String, Option<PathBuf>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ManagedModel for ScriptedLlm {
        fn model_id(&self) -> &str {
            "fake-llm"
        }
        fn footprint_gb(&self) -> f64 {
            4.8
        }
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }
        async fn load(&self) -> Result<(), ModelError> {
            self.memory.reserve("fake-llm", 4.8)?;
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn unload(&self) -> Result<(), ModelError> {
            self.memory.release("fake-llm");
            self.loaded.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ReasoningModel for ScriptedLlm {
        async fn run(&self, prompt: &str, image: Option<&Path>) -> Result<String, ModelError> {
            self.load().await?;
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), image.map(Path::to_path_buf)));
            match self.answers.lock().unwrap().pop_front() {
                Some(Ok(answer)) => Ok(answer),
                Some(Err(e)) => Err(ModelError::Task(e)),
                None => Err(ModelError::Task("no scripted answer".to_string())),
            }
        }
    }

    struct Harness {
        workflow: DocumentWorkflow,
        llm: Arc<ScriptedLlm>,
        path: PathBuf,
        _dir: TempDir,
    }

    async fn harness(answers: Vec<Result<&str, &str>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = DbContext::new(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();

        let path = dir.path().join("tender.png");
        std::fs::write(&path, b"fake image").unwrap();

        let memory = MemoryManager::shared(6.0, "cuda:0");
        let ocr = Arc::new(FakeOcr {
            memory: Arc::clone(&memory),
            loaded: AtomicBool::new(false),
        });
        let llm = Arc::new(ScriptedLlm {
            memory: Arc::clone(&memory),
            loaded: AtomicBool::new(false),
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        });

        let workflow = DocumentWorkflow::new(
            ocr,
            Arc::clone(&llm) as Arc<dyn ReasoningModel>,
            memory,
            db.documents(),
            0.7,
        );
        Harness {
            workflow,
            llm,
            path,
            _dir: dir,
        }
    }

    const VISION: &str = r#"{"stamps": true, "signatures": 2}"#;
    const TEXT: &str = r#"{"project": "Road Tender", "budget": "2,000,000 EUR"}"#;

    #[tokio::test]
    async fn test_confident_fusion_skips_thinking() {
        let fusion = r#"{"confidence_score": 0.92, "summary": "Stamps match the issuer", "flag": "Green"}"#;
        let h = harness(vec![Ok(VISION), Ok(TEXT), Ok(fusion)]).await;

        let raw = h.workflow.process_document(&h.path).await.unwrap();
        assert_eq!(raw, fusion);

        let prompts = h.llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0].1.as_deref(), Some(h.path.as_path()));
        assert!(prompts[1].0.contains("Budget: 2,000,000 EUR"));
        assert!(prompts[2].0.contains(VISION) && prompts[2].0.contains(TEXT));

        let docs = h.workflow.documents().list(None).await.unwrap();
        let doc = &docs[0];
        assert_eq!(doc.status, DocumentStatus::Complete);
        assert_eq!(doc.confidence_score, Some(0.92));
        assert_eq!(doc.flag, Some(Flag::Green));
        assert_eq!(doc.agent_reasoning.as_deref(), Some("Stamps match the issuer"));
        assert_eq!(doc.intelligence.as_deref(), Some(fusion));
        assert_eq!(h.workflow.memory().vram_usage_gb(), 0.0);
    }

    #[tokio::test]
    async fn test_low_confidence_runs_thinking_mode() {
        let fusion = r#"{"confidence_score": 0.4, "summary": "Unclear", "flag": "Red"}"#;
        let thinking = r#"{"confidence_score": 0.81, "summary": "Stamp is on page 2", "flag": "Green"}"#;
        let h = harness(vec![Ok(VISION), Ok(TEXT), Ok(fusion), Ok(thinking)]).await;

        let outcome = h.workflow.process(&h.path).await.unwrap();
        assert!(outcome.thinking_used);
        assert_eq!(outcome.raw_output, thinking);
        assert_eq!(outcome.confidence, 0.81);
        assert_eq!(outcome.flag, Flag::Green);

        let prompts = h.llm.prompts();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[3].0.starts_with("CRITICAL RE-ANALYSIS"));
        assert!(prompts[3].0.contains(VISION));
        assert_eq!(prompts[3].1.as_deref(), Some(h.path.as_path()));
    }

    #[tokio::test]
    async fn test_unparseable_outputs_fall_back() {
        let h = harness(vec![
            Ok(VISION),
            Ok(TEXT),
            Ok("I think the document is fine."),
            Ok("Step 1: the stamp is blurred."),
        ])
        .await;

        let outcome = h.workflow.process(&h.path).await.unwrap();
        assert_eq!(outcome.confidence, 0.5);
        assert_eq!(outcome.flag, Flag::Yellow);
        assert_eq!(outcome.summary, "Step 1: the stamp is blurred.");

        let doc = h.workflow.documents().get(outcome.id).await.unwrap().unwrap();
        assert_eq!(doc.confidence_score, Some(0.5));
        assert_eq!(doc.flag, Some(Flag::Yellow));
    }

    #[tokio::test]
    async fn test_thinking_without_score_keeps_previous() {
        let fusion = r#"{"confidence_score": 0.3, "summary": "Mismatch"}"#;
        let thinking = r#"{"summary": "Budget differs between pages"}"#;
        let h = harness(vec![Ok(VISION), Ok(TEXT), Ok(fusion), Ok(thinking)]).await;

        let outcome = h.workflow.process(&h.path).await.unwrap();
        assert_eq!(outcome.confidence, 0.3);
        assert_eq!(outcome.flag, Flag::Red);
        assert_eq!(outcome.summary, "Budget differs between pages");
    }

    #[tokio::test]
    async fn test_missing_score_defaults_to_zero() {
        let fusion = r#"{"summary": "No score given", "flag": "Green"}"#;
        let thinking = r#"{"confidence_score": 0.75, "summary": "Consistent"}"#;
        let h = harness(vec![Ok(VISION), Ok(TEXT), Ok(fusion), Ok(thinking)]).await;

        let outcome = h.workflow.process(&h.path).await.unwrap();
        assert!(outcome.thinking_used);
        assert_eq!(outcome.confidence, 0.75);
        assert_eq!(outcome.flag, Flag::Green);
    }

    #[tokio::test]
    async fn test_agent_failure_marks_row_failed() {
        let h = harness(vec![Ok(VISION), Err("model server went away")]).await;
        let (tx, mut rx) = mpsc::channel(16);
        let workflow = h.workflow.with_events(tx);

        let err = workflow.process(&h.path).await.unwrap_err();
        assert!(err.to_string().contains("model server went away"));

        let docs = workflow.documents().list(None).await.unwrap();
        assert_eq!(docs[0].status, DocumentStatus::Failed);
        assert!(docs[0].error.as_deref().unwrap().contains("model server went away"));
        assert_eq!(workflow.memory().vram_usage_gb(), 0.0);

        drop(workflow);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(PipelineEvent::Started { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
    }
}
