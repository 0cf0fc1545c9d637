//! Postgres persistence: source-event reads, the clear-and-replace
//! transaction for the canonical layer, the AI resolution cache and usage
//! ledger, and the configuration store.

pub mod config_store;
pub mod models;
pub mod persist;
pub mod schema;

pub use models::ai_cache::AiCacheEntry;
pub use models::ai_usage::AiUsageRow;
pub use persist::{replace_run_output, ReplaceOutcome};
