use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::models::{ModelError, ReasoningModel};

const VISION_PROMPT: &str = "Analyze the provided document image. Specifically look for:\n\
1. Presence of official stamps.\n\
2. Presence of signatures.\n\
3. If there are any site plans or technical diagrams.\n\
Return a JSON-formatted summary of your findings.";

/// Looks at the page image for stamps, signatures and drawings.
pub struct VisionAgent {
    model: Arc<dyn ReasoningModel>,
}

impl VisionAgent {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self { model }
    }

    pub fn prompt() -> &'static str {
        VISION_PROMPT
    }

    /// Run the visual landmark prompt with the document image attached.
    pub async fn analyze_visuals(&self, image_path: &Path) -> Result<String, ModelError> {
        info!("Vision agent: analyzing visual landmarks");
        self.model.run(VISION_PROMPT, Some(image_path)).await
    }
}
