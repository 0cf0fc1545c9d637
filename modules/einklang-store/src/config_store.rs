//! The configuration store: a key-value singleton holding the serialized
//! `MatchingConfig` and the sealed LLM credential.
//!
//! Loaded once at the start of every run; a config-file fallback applies
//! when no stored row exists, then the compiled defaults.

use std::path::Path;

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use einklang_common::{CredentialSealer, MatchingConfig, PipelineError};

const CONFIG_KEY: &str = "matching_config";
const CREDENTIAL_KEY: &str = "llm_credential";

async fn get_value(key: &str, pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM matching_config WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

async fn put_value(key: &str, value: &str, pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO matching_config (key, value) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the per-run matching config: stored row, then file fallback, then
/// compiled defaults. Any malformed payload is a fatal config error: the
/// run must not proceed on guessed settings.
pub async fn load_matching_config(
    pool: &PgPool,
    fallback_path: Option<&Path>,
) -> Result<MatchingConfig, PipelineError> {
    let stored = get_value(CONFIG_KEY, pool)
        .await
        .map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;

    if let Some(toml) = stored {
        let config = MatchingConfig::from_toml_str(&toml)
            .map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;
        info!("matching config loaded from store");
        return Ok(config);
    }

    if let Some(path) = fallback_path {
        let config =
            MatchingConfig::from_file(path).map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;
        info!(path = %path.display(), "matching config loaded from file fallback");
        return Ok(config);
    }

    info!("no stored or file config, using defaults");
    Ok(MatchingConfig::default())
}

/// Persist a matching config as the new singleton value.
pub async fn store_matching_config(config: &MatchingConfig, pool: &PgPool) -> Result<()> {
    let toml = config.to_toml_string()?;
    put_value(CONFIG_KEY, &toml, pool).await?;
    Ok(())
}

/// Load and open the sealed LLM credential, if one is stored.
pub async fn load_credential(
    sealer: &CredentialSealer,
    pool: &PgPool,
) -> Result<Option<String>, PipelineError> {
    let sealed = get_value(CREDENTIAL_KEY, pool)
        .await
        .map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;

    match sealed {
        Some(payload) => {
            let plaintext =
                sealer.open(&payload).map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;
            Ok(Some(plaintext))
        }
        None => Ok(None),
    }
}

/// Seal and store the LLM credential.
pub async fn store_credential(
    credential: &str,
    sealer: &CredentialSealer,
    pool: &PgPool,
) -> Result<()> {
    let sealed = sealer.seal(credential)?;
    put_value(CREDENTIAL_KEY, &sealed, pool).await?;
    Ok(())
}
