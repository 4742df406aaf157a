use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ManagedModel, ModelError, OcrModel};
use crate::config::Settings;
use crate::llm::LlmClient;
use crate::memory::MemoryManager;
use crate::ocr::{
    ocr_document, OcrBackend, OcrBackendType, OcrConfig, OcrOutput, TesseractBackend,
    VisionBackend,
};

/// Stage 1 OCR model.
///
/// Wraps whichever [`OcrBackend`] the settings select. When the backend is a
/// vision model on the model server, load and unload also warm up and evict
/// it there.
pub struct ChandraOcrModel {
    model_id: String,
    footprint_gb: f64,
    backend: Arc<dyn OcrBackend>,
    server: Option<LlmClient>,
    memory: Arc<MemoryManager>,
    loaded: AtomicBool,
}

impl ChandraOcrModel {
    /// Build the OCR model described by `settings`.
    pub fn from_settings(
        settings: &Settings,
        memory: Arc<MemoryManager>,
    ) -> Result<Self, ModelError> {
        let (backend, server): (Arc<dyn OcrBackend>, Option<LlmClient>) =
            match settings.ocr_backend {
                OcrBackendType::Tesseract => {
                    let config = OcrConfig {
                        language: settings.ocr_language.clone(),
                        use_gpu: false,
                        gpu_device: settings.gpu_device.clone(),
                    };
                    (Arc::new(TesseractBackend::with_config(config)), None)
                }
                OcrBackendType::Vision => {
                    let client = LlmClient::new(settings.llm.clone())?;
                    let backend =
                        VisionBackend::new(client.clone(), settings.ocr_model_version.clone());
                    (Arc::new(backend), Some(client))
                }
            };

        Ok(Self::with_backend(
            settings.ocr_model_version.clone(),
            settings.ocr_footprint_gb,
            backend,
            server,
            memory,
        ))
    }

    pub fn with_backend(
        model_id: impl Into<String>,
        footprint_gb: f64,
        backend: Arc<dyn OcrBackend>,
        server: Option<LlmClient>,
        memory: Arc<MemoryManager>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            footprint_gb,
            backend,
            server,
            memory,
            loaded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ManagedModel for ChandraOcrModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn footprint_gb(&self) -> f64 {
        self.footprint_gb
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<(), ModelError> {
        if self.is_loaded() {
            return Ok(());
        }
        info!(
            "Loading OCR model {} ({} backend) on {}",
            self.model_id,
            self.backend.backend_type(),
            self.memory.device()
        );
        self.memory.reserve(&self.model_id, self.footprint_gb)?;
        if let Some(ref server) = self.server {
            if let Err(e) = server.load_model(&self.model_id).await {
                self.memory.release(&self.model_id);
                return Err(e.into());
            }
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<(), ModelError> {
        if !self.loaded.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Unloading OCR model {}", self.model_id);
        let result = match self.server {
            Some(ref server) => server.unload_model(&self.model_id).await,
            None => Ok(()),
        };
        self.memory.release(&self.model_id);
        result.map_err(ModelError::from)
    }
}

#[async_trait]
impl OcrModel for ChandraOcrModel {
    async fn run(&self, path: &Path) -> Result<OcrOutput, ModelError> {
        self.load().await?;

        let backend = Arc::clone(&self.backend);
        let path = path.to_path_buf();
        let output = tokio::task::spawn_blocking(move || ocr_document(backend.as_ref(), &path))
            .await
            .map_err(|e| ModelError::Task(e.to_string()))??;

        info!(
            "OCR extracted {} chars from {} page(s)",
            output.text.len(),
            output.page_count
        );
        Ok(output)
    }
}
