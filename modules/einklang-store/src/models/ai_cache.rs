use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Cached AI verdict for one content hash. Survives pipeline runs; a model
/// change makes the lookup miss, which effectively invalidates the entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AiCacheEntry {
    pub content_hash: String,
    pub decision: String,
    pub confidence: f64,
    pub reasoning: String,
    pub model_id: String,
    pub resolved_at: DateTime<Utc>,
}

impl AiCacheEntry {
    /// Look up a verdict for this hash, resolved by this exact model.
    pub async fn get(content_hash: &str, model_id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM ai_match_cache WHERE content_hash = $1 AND model_id = $2",
        )
        .bind(content_hash)
        .bind(model_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Store a verdict (upsert keyed by content hash).
    pub async fn put(
        content_hash: &str,
        decision: &str,
        confidence: f64,
        reasoning: &str,
        model_id: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_match_cache (content_hash, decision, confidence, reasoning, model_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (content_hash)
             DO UPDATE SET decision = EXCLUDED.decision,
                           confidence = EXCLUDED.confidence,
                           reasoning = EXCLUDED.reasoning,
                           model_id = EXCLUDED.model_id,
                           resolved_at = now()",
        )
        .bind(content_hash)
        .bind(decision)
        .bind(confidence)
        .bind(reasoning)
        .bind(model_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
