//! Code-driven schema bootstrap.
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS` statements, executed in
//! dependency order. The clear-and-replace transaction (persist.rs) relies
//! on the foreign keys declared here, which is why its deletes run
//! child-first.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

const SCHEMA: &[&str] = &[
    // Source events are written by the ingestion collaborator; the core
    // only reads them.
    "CREATE TABLE IF NOT EXISTS source_events (
        id              TEXT PRIMARY KEY,
        file_id         TEXT NOT NULL,
        title           TEXT NOT NULL,
        short_description TEXT,
        description     TEXT,
        highlights      JSONB NOT NULL DEFAULT '[]',
        location        JSONB NOT NULL DEFAULT '{}',
        geo             JSONB,
        source_code     TEXT NOT NULL,
        source_type     TEXT NOT NULL,
        categories      JSONB NOT NULL DEFAULT '[]',
        flags           JSONB NOT NULL DEFAULT '{}',
        dates           JSONB NOT NULL,
        ingested_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_source_events_file ON source_events (file_id)",
    "CREATE TABLE IF NOT EXISTS canonical_events (
        id               BIGSERIAL PRIMARY KEY,
        title            TEXT NOT NULL,
        short_description TEXT,
        description      TEXT,
        highlights       JSONB NOT NULL DEFAULT '[]',
        location         JSONB NOT NULL DEFAULT '{}',
        geo              JSONB,
        categories       JSONB NOT NULL DEFAULT '[]',
        flags            JSONB NOT NULL DEFAULT '{}',
        dates            JSONB NOT NULL,
        source_count     INTEGER NOT NULL,
        match_confidence DOUBLE PRECISION NOT NULL,
        needs_review     BOOLEAN NOT NULL DEFAULT false,
        ai_assisted      BOOLEAN NOT NULL DEFAULT false,
        field_provenance JSONB NOT NULL DEFAULT '{}',
        version          INTEGER NOT NULL DEFAULT 1,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS canonical_event_sources (
        canonical_id    BIGINT NOT NULL REFERENCES canonical_events (id),
        source_event_id TEXT NOT NULL REFERENCES source_events (id),
        PRIMARY KEY (canonical_id, source_event_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_ces_canonical ON canonical_event_sources (canonical_id)",
    "CREATE INDEX IF NOT EXISTS idx_ces_source ON canonical_event_sources (source_event_id)",
    "CREATE TABLE IF NOT EXISTS match_decisions (
        id                BIGSERIAL PRIMARY KEY,
        id_a              TEXT NOT NULL,
        id_b              TEXT NOT NULL,
        date_score        DOUBLE PRECISION NOT NULL,
        geo_score         DOUBLE PRECISION NOT NULL,
        title_score       DOUBLE PRECISION NOT NULL,
        description_score DOUBLE PRECISION NOT NULL,
        combined_score    DOUBLE PRECISION NOT NULL,
        decision          TEXT NOT NULL,
        tier              TEXT NOT NULL,
        reasoning         TEXT,
        CHECK (id_a < id_b),
        UNIQUE (id_a, id_b)
    )",
    "CREATE INDEX IF NOT EXISTS idx_decisions_a ON match_decisions (id_a)",
    "CREATE INDEX IF NOT EXISTS idx_decisions_b ON match_decisions (id_b)",
    // AI artifacts survive pipeline runs; only a model change invalidates
    // cache entries (the lookup is keyed on model_id too).
    "CREATE TABLE IF NOT EXISTS ai_match_cache (
        content_hash TEXT PRIMARY KEY,
        decision     TEXT NOT NULL,
        confidence   DOUBLE PRECISION NOT NULL,
        reasoning    TEXT NOT NULL,
        model_id     TEXT NOT NULL,
        resolved_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS ai_usage_log (
        id             BIGSERIAL PRIMARY KEY,
        batch_id       UUID NOT NULL,
        id_a           TEXT NOT NULL,
        id_b           TEXT NOT NULL,
        input_tokens   INTEGER NOT NULL,
        output_tokens  INTEGER NOT NULL,
        estimated_cost DOUBLE PRECISION NOT NULL,
        cache_hit      BOOLEAN NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_ai_usage_batch ON ai_usage_log (batch_id)",
    "CREATE TABLE IF NOT EXISTS matching_config (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// Create all tables and indices. Safe to run on every start.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(statements = SCHEMA.len(), "schema bootstrap complete");
    Ok(())
}
