//! Shared utility functions.
//!
//! - `hash`: content hashing for duplicate detection
//! - `text`: previews and human-readable formatting

mod hash;
mod text;

pub use hash::sha256_file;
pub use text::{format_size, preview};
