//! LLM integration for reasoning, vision OCR and embeddings.
//!
//! Talks to a model server (Ollama by default, or any OpenAI-compatible API).
//! The server owns the weights; this side only decides which model is
//! resident and what gets asked of it.

mod client;

pub use client::{encode_image_base64, EncodedImage, LlmClient, LlmConfig, LlmError, LlmProvider};
