use std::sync::Arc;

use tracing::info;

use crate::models::{ModelError, ReasoningModel};

/// Pulls structured project details out of the OCR Markdown.
pub struct TextAgent {
    model: Arc<dyn ReasoningModel>,
}

impl TextAgent {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self { model }
    }

    pub fn prompt(markdown: &str) -> String {
        format!(
            "Review the following extracted document text (Markdown format):\n\n\
             {markdown}\n\n\
             Extract the following details as JSON:\n\
             1. Project Name / Title.\n\
             2. Total Amount or Budget (if mentioned).\n\
             3. Key Dates (Submission, Deadlines).\n\
             4. Main Stakeholders."
        )
    }

    pub async fn extract_details(&self, markdown: &str) -> Result<String, ModelError> {
        info!("Text agent: extracting structured details");
        self.model.run(&Self::prompt(markdown), None).await
    }
}
