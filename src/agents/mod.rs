//! Prompt-template agents for Stage 2.
//!
//! Each agent is a thin wrapper around the shared reasoning model: it builds
//! a prompt, runs it, and hands back the raw model output. Interpreting the
//! fusion output is left to [`Validation::parse`].

mod fusion;
mod text;
mod validation;
mod vision;

pub use fusion::{thinking_prompt, FusionAgent};
pub use text::TextAgent;
pub use validation::{Flag, Validation, ValidationError};
pub use vision::VisionAgent;
