pub mod ai_cache;
pub mod ai_usage;
pub mod canonical;
pub mod decision;
pub mod source_event;
