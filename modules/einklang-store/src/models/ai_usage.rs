use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// One append-only usage ledger row. Ledger rows are never rolled back,
/// even when the run is cancelled; the cost happened.
#[derive(Debug, Clone)]
pub struct AiUsageRow {
    pub batch_id: Uuid,
    pub id_a: String,
    pub id_b: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub estimated_cost: f64,
    pub cache_hit: bool,
}

impl AiUsageRow {
    pub async fn append(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_usage_log
                (batch_id, id_a, id_b, input_tokens, output_tokens, estimated_cost, cache_hit)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(self.batch_id)
        .bind(&self.id_a)
        .bind(&self.id_b)
        .bind(self.input_tokens)
        .bind(self.output_tokens)
        .bind(self.estimated_cost)
        .bind(self.cache_hit)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Total estimated cost of one batch, for the run log.
    pub async fn batch_cost(batch_id: Uuid, pool: &PgPool) -> Result<f64> {
        let row = sqlx::query_as::<_, (Option<f64>,)>(
            "SELECT SUM(estimated_cost) FROM ai_usage_log WHERE batch_id = $1",
        )
        .bind(batch_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0.unwrap_or(0.0))
    }
}
