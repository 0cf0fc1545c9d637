pub mod config;
pub mod crypto;
pub mod error;
pub mod types;

pub use config::{AppConfig, MatchingConfig};
pub use crypto::CredentialSealer;
pub use error::{CryptoError, PipelineError};
pub use types::*;
