//! Accelerator memory bookkeeping.
//!
//! The OCR model and the reasoning LLM do not fit in the VRAM budget at the
//! same time. Every model reserves its footprint here before loading and
//! releases it after unloading, so a pipeline bug that would co-locate them
//! shows up as `MemoryError::BudgetExceeded` instead of an out-of-memory
//! crash on the model server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ManagedModel;

/// Errors from memory accounting.
#[derive(Debug, Error, PartialEq)]
pub enum MemoryError {
    #[error(
        "Loading {model} ({requested:.1} GB) would exceed the VRAM budget: {in_use:.1} of {limit:.1} GB in use"
    )]
    BudgetExceeded {
        model: String,
        requested: f64,
        in_use: f64,
        limit: f64,
    },
}

/// Tracks which models are resident on the accelerator.
#[derive(Debug)]
pub struct MemoryManager {
    limit_gb: f64,
    device: String,
    resident: Mutex<HashMap<String, f64>>,
}

impl MemoryManager {
    pub fn new(limit_gb: f64, device: impl Into<String>) -> Self {
        Self {
            limit_gb,
            device: device.into(),
            resident: Mutex::new(HashMap::new()),
        }
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared(limit_gb: f64, device: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(limit_gb, device))
    }

    pub fn limit_gb(&self) -> f64 {
        self.limit_gb
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, f64>> {
        // A poisoned map is still consistent; every mutation is a single insert/remove.
        self.resident
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve `gb` for `model_id`. Reserving an already-resident model is a no-op.
    pub fn reserve(&self, model_id: &str, gb: f64) -> Result<(), MemoryError> {
        let mut resident = self.lock();
        if resident.contains_key(model_id) {
            return Ok(());
        }

        let in_use: f64 = resident.values().sum();
        if in_use + gb > self.limit_gb {
            warn!(
                "Refusing to load {} on {}: {:.1} + {:.1} GB > {:.1} GB",
                model_id, self.device, in_use, gb, self.limit_gb
            );
            return Err(MemoryError::BudgetExceeded {
                model: model_id.to_string(),
                requested: gb,
                in_use,
                limit: self.limit_gb,
            });
        }

        resident.insert(model_id.to_string(), gb);
        debug!(
            "Reserved {:.1} GB for {} ({:.1}/{:.1} GB)",
            gb,
            model_id,
            in_use + gb,
            self.limit_gb
        );
        Ok(())
    }

    /// Forget a model's reservation. Returns the freed amount.
    pub fn release(&self, model_id: &str) -> f64 {
        let freed = self.lock().remove(model_id).unwrap_or(0.0);
        if freed > 0.0 {
            debug!("Released {:.1} GB held by {}", freed, model_id);
        }
        freed
    }

    /// Drop every reservation. Returns the amount freed in GB.
    pub fn clear_gpu_cache(&self) -> f64 {
        let mut resident = self.lock();
        let freed: f64 = resident.values().sum();
        resident.clear();
        info!("Cleared GPU cache on {} ({:.1} GB freed)", self.device, freed);
        freed
    }

    /// Sum of resident footprints in GB.
    pub fn vram_usage_gb(&self) -> f64 {
        self.lock().values().sum()
    }

    /// Names of resident models, sorted.
    pub fn resident_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.lock().keys().cloned().collect();
        models.sort();
        models
    }

    /// Unload `model` if given, then clear the cache.
    pub async fn unload_model<M>(&self, model: Option<&M>)
    where
        M: ManagedModel + ?Sized,
    {
        if let Some(model) = model {
            if model.is_loaded() {
                info!("Unloading {}", model.model_id());
                if let Err(e) = model.unload().await {
                    warn!("Failed to unload {}: {}", model.model_id(), e);
                }
            }
        }
        self.clear_gpu_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_rejects_co_residency() {
        let memory = MemoryManager::new(6.0, "cuda:0");
        memory.reserve("ocr", 2.5).unwrap();
        assert_eq!(memory.vram_usage_gb(), 2.5);

        let err = memory.reserve("llm", 4.8).unwrap_err();
        assert!(matches!(err, MemoryError::BudgetExceeded { ref model, .. } if model == "llm"));

        assert_eq!(memory.release("ocr"), 2.5);
        memory.reserve("llm", 4.8).unwrap();
        assert_eq!(memory.resident_models(), vec!["llm".to_string()]);
    }

    #[test]
    fn test_reserve_is_idempotent() {
        let memory = MemoryManager::new(6.0, "cuda:0");
        memory.reserve("ocr", 2.5).unwrap();
        memory.reserve("ocr", 2.5).unwrap();
        assert_eq!(memory.vram_usage_gb(), 2.5);
    }

    #[test]
    fn test_clear_gpu_cache() {
        let memory = MemoryManager::new(10.0, "cuda:0");
        memory.reserve("a", 1.0).unwrap();
        memory.reserve("b", 2.0).unwrap();
        assert_eq!(memory.clear_gpu_cache(), 3.0);
        assert_eq!(memory.vram_usage_gb(), 0.0);
        assert_eq!(memory.release("a"), 0.0);
    }
}
