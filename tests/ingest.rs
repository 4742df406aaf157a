//! End-to-end ingest runs with stand-in models.
//!
//! Exercises the public workflow and ingest APIs against a real SQLite file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use docintel::agents::Flag;
use docintel::ingest::IngestPipeline;
use docintel::memory::MemoryManager;
use docintel::models::{ManagedModel, ModelError, OcrModel, ReasoningModel};
use docintel::ocr::{LayoutBlock, OcrOutput};
use docintel::repository::{DbContext, DocumentStatus};
use docintel::workflow::DocumentWorkflow;

struct StubOcr {
    memory: Arc<MemoryManager>,
    loaded: AtomicBool,
}

#[async_trait]
impl ManagedModel for StubOcr {
    fn model_id(&self) -> &str {
        "stub-ocr"
    }
    fn footprint_gb(&self) -> f64 {
        2.5
    }
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
    async fn load(&self) -> Result<(), ModelError> {
        self.memory.reserve(self.model_id(), self.footprint_gb())?;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }
    async fn unload(&self) -> Result<(), ModelError> {
        self.memory.release(self.model_id());
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OcrModel for StubOcr {
    async fn run(&self, path: &Path) -> Result<OcrOutput, ModelError> {
        self.load().await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(OcrOutput {
            text: format!("# {}\n\nTotal: 1,200.00 EUR", name),
            layout: vec![LayoutBlock {
                page: 1,
                block: 1,
                bbox: None,
                lines: 3,
                text: format!("# {}", name),
                confidence: Some(0.88),
            }],
            confidence: Some(0.88),
            page_count: 1,
        })
    }
}

/// Answers every prompt with a confident verdict, optionally failing the
/// first `fail_first` calls.
struct StubLlm {
    memory: Arc<MemoryManager>,
    loaded: AtomicBool,
    calls: AtomicUsize,
    fail_first: usize,
}

#[async_trait]
impl ManagedModel for StubLlm {
    fn model_id(&self) -> &str {
        "stub-llm"
    }
    fn footprint_gb(&self) -> f64 {
        4.8
    }
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
    async fn load(&self) -> Result<(), ModelError> {
        self.memory.reserve(self.model_id(), self.footprint_gb())?;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }
    async fn unload(&self) -> Result<(), ModelError> {
        self.memory.release(self.model_id());
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ReasoningModel for StubLlm {
    async fn run(&self, _prompt: &str, _image: Option<&Path>) -> Result<String, ModelError> {
        self.load().await?;
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(ModelError::Task("model server unreachable".to_string()));
        }
        Ok(r#"{"confidence_score": 0.92, "summary": "Totals and stamp agree"}"#.to_string())
    }
}

struct Setup {
    pipeline: IngestPipeline,
    db: DbContext,
    memory: Arc<MemoryManager>,
    data_dir: PathBuf,
    _dir: tempfile::TempDir,
}

async fn setup(fail_first: usize) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();

    let db = DbContext::new(&dir.path().join("storage.db"));
    db.init_schema().await.unwrap();

    let memory = MemoryManager::shared(6.0, "cuda:0");
    let ocr = Arc::new(StubOcr {
        memory: Arc::clone(&memory),
        loaded: AtomicBool::new(false),
    });
    let llm = Arc::new(StubLlm {
        memory: Arc::clone(&memory),
        loaded: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
        fail_first,
    });
    let workflow = DocumentWorkflow::new(ocr, llm, Arc::clone(&memory), db.documents(), 0.7);
    let pipeline = IngestPipeline::new(Arc::new(Mutex::new(workflow)), data_dir.clone());

    Setup {
        pipeline,
        db,
        memory,
        data_dir,
        _dir: dir,
    }
}

#[tokio::test]
async fn scan_processes_new_documents_once() {
    let s = setup(0).await;
    std::fs::write(s.data_dir.join("invoice.png"), b"invoice bytes").unwrap();
    std::fs::write(s.data_dir.join("tender.pdf"), b"tender bytes").unwrap();
    std::fs::write(s.data_dir.join("readme.txt"), b"ignored").unwrap();

    let first = s.pipeline.scan().await.unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.failed, 0);

    let docs = s.db.documents().list(None).await.unwrap();
    assert_eq!(docs.len(), 2);
    for doc in &docs {
        assert_eq!(doc.status, DocumentStatus::Complete);
        assert_eq!(doc.confidence_score, Some(0.92));
        assert_eq!(doc.flag, Some(Flag::Green));
        assert_eq!(doc.agent_reasoning.as_deref(), Some("Totals and stamp agree"));
        assert!(doc.ocr_text.contains("Total: 1,200.00 EUR"));
    }
    assert_eq!(s.memory.vram_usage_gb(), 0.0);

    // Same content under a new name is recognised by hash.
    std::fs::write(s.data_dir.join("invoice-copy.png"), b"invoice bytes").unwrap();
    let second = s.pipeline.scan().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(s.db.documents().count().await.unwrap(), 2);
}

#[tokio::test]
async fn overlapping_scans_process_each_file_once() {
    let s = setup(0).await;
    std::fs::write(s.data_dir.join("offer.pdf"), b"offer bytes").unwrap();
    std::fs::write(s.data_dir.join("permit.png"), b"permit bytes").unwrap();

    let first = s.pipeline.clone();
    let second = s.pipeline.clone();
    let (a, b) = tokio::join!(first.scan(), second.scan());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.processed + b.processed, 2);
    assert_eq!(a.skipped + b.skipped, 2);
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(s.db.documents().count().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_documents_are_retried() {
    let s = setup(1).await;
    std::fs::write(s.data_dir.join("scan.jpg"), b"scan bytes").unwrap();

    let first = s.pipeline.scan().await.unwrap();
    assert_eq!(first.failed, 1);
    let docs = s.db.documents().list(None).await.unwrap();
    assert_eq!(docs[0].status, DocumentStatus::Failed);
    assert!(docs[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("model server unreachable"));
    assert_eq!(s.memory.vram_usage_gb(), 0.0);

    let second = s.pipeline.scan().await.unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(
        s.db.documents()
            .count_by_status(DocumentStatus::Complete)
            .await
            .unwrap(),
        1
    );
}
