use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::models::{ModelError, ReasoningModel};

/// Cross-checks the vision and text findings and scores them.
pub struct FusionAgent {
    model: Arc<dyn ReasoningModel>,
}

impl FusionAgent {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self { model }
    }

    pub fn prompt(vision: &str, text: &str) -> String {
        format!(
            "You are a Fusion & Validation Agent. Compare the findings from a Vision Specialist and a Text Specialist.\n\n\
             Vision Findings:\n{vision}\n\n\
             Text Findings:\n{text}\n\n\
             Calculate a final Confidence Score (0.0 to 1.0) and validation summary.\n\
             Return EXACTLY as a JSON object with keys: 'confidence_score' (float), 'summary' (string), and 'flag' ('Green' or 'Red')."
        )
    }

    pub async fn validate_and_fuse(&self, vision: &str, text: &str) -> Result<String, ModelError> {
        info!("Fusion agent: cross-checking modalities");
        self.model.run(&Self::prompt(vision, text), None).await
    }

    /// Low-confidence retry with the deep re-analysis prompt and the image.
    pub async fn rethink(
        &self,
        vision: &str,
        text: &str,
        image_path: &Path,
    ) -> Result<String, ModelError> {
        info!("Fusion agent: thinking mode");
        self.model
            .run(&thinking_prompt(vision, text), Some(image_path))
            .await
    }
}

/// The "thinking mode" prompt used when fusion confidence is low.
pub fn thinking_prompt(vision: &str, text: &str) -> String {
    format!(
        "CRITICAL RE-ANALYSIS: The previous fusion attempt had low confidence. \
         Switching to deep Thinking Mode. Please analyze the discrepancies between \
         the visual stamps and the extracted text again, step-by-step. \
         Visuals: {vision}\nText: {text}\n\
         Return EXACTLY as a JSON object with keys: 'confidence_score' (float), 'summary' (string), and 'flag' ('Green' or 'Red')."
    )
}
