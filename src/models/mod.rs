//! Model wrappers for the two pipeline stages.
//!
//! Both stages share the [`ManagedModel`] lifecycle: a model reserves its
//! footprint with the [`MemoryManager`](crate::memory::MemoryManager) when it
//! loads and releases it when it unloads. Loading is lazy, so `run` loads the
//! model on first use.

mod ocr_model;
mod reasoning;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::MemoryError;
use crate::ocr::{OcrError, OcrOutput};

pub use ocr_model::ChandraOcrModel;
pub use reasoning::ReasoningLlm;

/// Errors from model wrappers.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model task failed: {0}")]
    Task(String),
}

/// Lifecycle shared by every model the pipeline loads.
#[async_trait]
pub trait ManagedModel: Send + Sync {
    /// Model name as known to the backend.
    fn model_id(&self) -> &str;

    /// Accelerator memory the model occupies when loaded, in GB.
    fn footprint_gb(&self) -> f64;

    fn is_loaded(&self) -> bool;

    /// Reserve memory and warm the model up.
    async fn load(&self) -> Result<(), ModelError>;

    /// Drop the model from the backend and release its reservation.
    async fn unload(&self) -> Result<(), ModelError>;
}

/// Stage 1: OCR to Markdown and layout.
#[async_trait]
pub trait OcrModel: ManagedModel {
    async fn run(&self, path: &Path) -> Result<OcrOutput, ModelError>;
}

/// Stage 2: prompt (optionally with an image) to raw text.
#[async_trait]
pub trait ReasoningModel: ManagedModel {
    async fn run(&self, prompt: &str, image: Option<&Path>) -> Result<String, ModelError>;
}
