//! Minimal Anthropic Messages API client: structured extraction with token
//! accounting, bounded retries, and a per-call deadline.

mod client;
mod error;
mod types;

pub use client::{Claude, Extraction};
pub use error::AiClientError;
pub use types::Usage;
