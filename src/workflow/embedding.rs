use crate::llm::{LlmClient, LlmError};

/// Computes the stored embedding of a document's OCR text.
#[derive(Clone)]
pub struct Embedder {
    client: LlmClient,
    model: String,
    max_dims: usize,
}

impl Embedder {
    pub fn new(client: LlmClient, model: impl Into<String>, max_dims: usize) -> Self {
        Self {
            client,
            model: model.into(),
            max_dims,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let vector = self.client.embed(&self.model, text).await?;
        Ok(truncate_embedding(vector, self.max_dims))
    }
}

/// Keep the first `max_dims` components and re-normalize (Matryoshka truncation).
pub fn truncate_embedding(mut vector: Vec<f32>, max_dims: usize) -> Vec<f32> {
    if vector.len() <= max_dims {
        return vector;
    }
    vector.truncate(max_dims);
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_embedding() {
        assert_eq!(truncate_embedding(vec![1.0, 2.0], 4), vec![1.0, 2.0]);

        let v = truncate_embedding(vec![3.0, 4.0, 12.0], 2);
        assert_eq!(v.len(), 2);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }
}
