//! docintel library.
//!
//! Stage 1 extracts text and layout with an OCR model. Stage 2 runs three
//! LLM agents (vision, text, fusion) over the result and scores it. Only one
//! model is resident at a time so the pipeline fits on small GPUs.

pub mod agents;
pub mod cli;
pub mod config;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod schema;
pub mod server;
pub mod utils;
pub mod workflow;
