use sqlx::{Postgres, Transaction};

use einklang_common::MatchDecision;

/// Insert one audit decision inside the replace transaction.
pub async fn insert_decision(
    decision: &MatchDecision,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO match_decisions
            (id_a, id_b, date_score, geo_score, title_score, description_score,
             combined_score, decision, tier, reasoning)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&decision.id_a)
    .bind(&decision.id_b)
    .bind(decision.date_score)
    .bind(decision.geo_score)
    .bind(decision.title_score)
    .bind(decision.description_score)
    .bind(decision.combined_score)
    .bind(decision.decision.to_string())
    .bind(decision.tier.to_string())
    .bind(&decision.reasoning)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
