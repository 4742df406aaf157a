use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ManagedModel, ModelError, ReasoningModel};
use crate::config::Settings;
use crate::llm::{encode_image_base64, EncodedImage, LlmClient, LlmError};
use crate::memory::MemoryManager;
use crate::ocr::{pdf_page_to_image, DocumentKind, OcrError};

/// Stage 2 reasoning model: a vision-language LLM on the model server.
///
/// Sampling (temperature 0.2, 1024 tokens by default) comes from the
/// client's [`LlmConfig`](crate::llm::LlmConfig).
pub struct ReasoningLlm {
    model_id: String,
    footprint_gb: f64,
    client: LlmClient,
    memory: Arc<MemoryManager>,
    loaded: AtomicBool,
}

impl ReasoningLlm {
    pub fn from_settings(
        settings: &Settings,
        memory: Arc<MemoryManager>,
    ) -> Result<Self, ModelError> {
        let client = LlmClient::new(settings.llm.clone())?;
        Ok(Self::new(
            settings.reasoning_llm_version.clone(),
            settings.reasoning_footprint_gb,
            client,
            memory,
        ))
    }

    pub fn new(
        model_id: impl Into<String>,
        footprint_gb: f64,
        client: LlmClient,
        memory: Arc<MemoryManager>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            footprint_gb,
            client,
            memory,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

/// Encode an image for the model, rendering the first page of a PDF.
async fn prepare_image(path: &Path) -> Result<EncodedImage, ModelError> {
    match DocumentKind::from_path(path)? {
        DocumentKind::Image => Ok(encode_image_base64(path)?),
        DocumentKind::Pdf => {
            let pdf: PathBuf = path.to_path_buf();
            tokio::task::spawn_blocking(move || -> Result<EncodedImage, ModelError> {
                let temp_dir = tempfile::TempDir::new().map_err(OcrError::from)?;
                let page = pdf_page_to_image(&pdf, 1, temp_dir.path())?;
                debug!("Rendered first page of {} for the LLM", pdf.display());
                encode_image_base64(&page).map_err(|e: LlmError| e.into())
            })
            .await
            .map_err(|e| ModelError::Task(e.to_string()))?
        }
    }
}

#[async_trait]
impl ManagedModel for ReasoningLlm {
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
            "Loading reasoning LLM {} on {}",
            self.model_id,
            self.memory.device()
        );
        self.memory.reserve(&self.model_id, self.footprint_gb)?;
        if let Err(e) = self.client.load_model(&self.model_id).await {
            self.memory.release(&self.model_id);
            return Err(e.into());
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<(), ModelError> {
        if !self.loaded.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Unloading reasoning LLM {}", self.model_id);
        let result = self.client.unload_model(&self.model_id).await;
        self.memory.release(&self.model_id);
        result.map_err(ModelError::from)
    }
}

#[async_trait]
impl ReasoningModel for ReasoningLlm {
    async fn run(&self, prompt: &str, image: Option<&Path>) -> Result<String, ModelError> {
        self.load().await?;

        let images = match image {
            Some(path) => vec![prepare_image(path).await?],
            None => Vec::new(),
        };
        let output = self
            .client
            .generate(&self.model_id, prompt, &images)
            .await?;
        debug!("{} returned {} chars", self.model_id, output.len());
        Ok(output)
    }
}
