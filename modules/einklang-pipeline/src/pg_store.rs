//! Postgres-backed resolution store.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use einklang_store::{AiCacheEntry, AiUsageRow};

use crate::resolver::{ArbiterVerdict, CachedVerdict, ResolutionStore, UsageRecord};

pub struct PgResolutionStore {
    pool: PgPool,
}

impl PgResolutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResolutionStore for PgResolutionStore {
    async fn cached_verdict(
        &self,
        content_hash: &str,
        model_id: &str,
    ) -> Result<Option<CachedVerdict>> {
        let entry = AiCacheEntry::get(content_hash, model_id, &self.pool).await?;
        entry
            .map(|e| {
                Ok(CachedVerdict {
                    decision: e.decision.parse().map_err(|err: String| anyhow::anyhow!(err))?,
                    confidence: e.confidence,
                    reasoning: e.reasoning,
                })
            })
            .transpose()
    }

    async fn store_verdict(
        &self,
        content_hash: &str,
        verdict: &ArbiterVerdict,
        model_id: &str,
    ) -> Result<()> {
        AiCacheEntry::put(
            content_hash,
            &verdict.decision.to_string(),
            verdict.confidence,
            &verdict.reasoning,
            model_id,
            &self.pool,
        )
        .await
    }

    async fn append_usage(&self, record: UsageRecord) -> Result<()> {
        AiUsageRow {
            batch_id: record.batch_id,
            id_a: record.id_a,
            id_b: record.id_b,
            input_tokens: record.input_tokens as i32,
            output_tokens: record.output_tokens as i32,
            estimated_cost: record.estimated_cost,
            cache_hit: record.cache_hit,
        }
        .append(&self.pool)
        .await
    }
}
