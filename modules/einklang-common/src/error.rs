use thiserror::Error;

/// Fatal error kinds surfaced by a pipeline run.
///
/// AI-call failures are deliberately absent: they are pair-local and are
/// recorded on the affected `MatchDecision` (tier `ai_unexpected`), never
/// raised as run errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be loaded at run start; the run does not execute.
    #[error("configuration load failed: {0}")]
    ConfigLoad(String),

    /// Reading source events failed before any write.
    #[error("storage read failed: {0}")]
    StorageRead(String),

    /// The clear-and-replace transaction failed; the previous canonical
    /// state is intact.
    #[error("persistence transaction failed: {0}")]
    Persistence(String),

    /// The run was cancelled before the persistence transaction committed.
    #[error("pipeline run cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from sealing/opening the LLM credential.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("credential key must be 32 bytes base64: {0}")]
    InvalidKey(String),

    #[error("credential sealing failed")]
    Seal,

    #[error("credential payload could not be opened: {0}")]
    Open(String),
}
