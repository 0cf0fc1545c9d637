use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use einklang_common::CanonicalDraft;

/// Insert one canonical event inside the replace transaction and return its
/// assigned id.
pub async fn insert_draft(
    draft: &CanonicalDraft,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO canonical_events
            (title, short_description, description, highlights, location, geo,
             categories, flags, dates, source_count, match_confidence,
             needs_review, ai_assisted, field_provenance, version)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 1)
         RETURNING id",
    )
    .bind(&draft.title)
    .bind(&draft.short_description)
    .bind(&draft.description)
    .bind(Json(&draft.highlights))
    .bind(Json(&draft.location))
    .bind(draft.geo.map(Json))
    .bind(Json(&draft.categories))
    .bind(Json(&draft.flags))
    .bind(Json(&draft.dates))
    .bind(draft.source_count as i32)
    .bind(draft.match_confidence)
    .bind(draft.needs_review)
    .bind(draft.ai_assisted)
    .bind(Json(&draft.field_provenance))
    .fetch_one(&mut **tx)
    .await
}

/// Link one cluster member to its canonical event.
pub async fn insert_link(
    canonical_id: i64,
    source_event_id: &str,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO canonical_event_sources (canonical_id, source_event_id) VALUES ($1, $2)",
    )
    .bind(canonical_id)
    .bind(source_event_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
