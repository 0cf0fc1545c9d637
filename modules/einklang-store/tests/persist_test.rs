//! Integration tests against a live Postgres (ignored by default).
//!
//! Run with a scratch database:
//!   DATABASE_URL=postgres://localhost/einklang_test cargo test -p einklang-store -- --ignored

use std::collections::BTreeMap;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use einklang_common::{
    CanonicalDraft, CredentialSealer, Decision, DecisionTier, EventDate, EventFlags, Location,
    MatchDecision, MatchingConfig, UNION_ALL_SOURCES,
};
use einklang_store::{config_store, replace_run_output, schema};

async fn test_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.expect("connect");
    schema::migrate(&pool).await.expect("migrate");
    pool
}

async fn seed_source_event(id: &str, pool: &PgPool) {
    sqlx::query(
        "INSERT INTO source_events
            (id, file_id, title, location, source_code, source_type, dates, flags)
         VALUES ($1, 'file-test', 'Testtermin', '{}', 'bz', 'terminliste',
                 $2, '{\"is_family\":false,\"is_child_focused\":false,\"admission_free\":false}')
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(sqlx::types::Json(vec![EventDate::on("2026-02-14".parse().unwrap())]))
    .execute(pool)
    .await
    .expect("seed source event");
}

fn draft(source_ids: &[&str]) -> CanonicalDraft {
    let mut provenance = BTreeMap::new();
    provenance.insert("title".to_string(), source_ids[0].to_string());
    provenance.insert("dates".to_string(), UNION_ALL_SOURCES.to_string());
    CanonicalDraft {
        title: "Testtermin".to_string(),
        short_description: None,
        description: None,
        highlights: Vec::new(),
        location: Location::default(),
        geo: None,
        categories: Vec::new(),
        flags: EventFlags::default(),
        dates: vec![EventDate::on("2026-02-14".parse().unwrap())],
        source_ids: source_ids.iter().map(|s| s.to_string()).collect(),
        source_count: source_ids.len() as u32,
        match_confidence: 1.0,
        needs_review: false,
        ai_assisted: false,
        field_provenance: provenance,
    }
}

fn decision(a: &str, b: &str) -> MatchDecision {
    MatchDecision {
        id_a: a.to_string(),
        id_b: b.to_string(),
        date_score: 1.0,
        geo_score: 1.0,
        title_score: 1.0,
        description_score: 0.5,
        combined_score: 0.92,
        decision: Decision::Match,
        tier: DecisionTier::Deterministic,
        reasoning: None,
    }
}

#[tokio::test]
#[ignore]
async fn replace_run_output_clears_previous_state() {
    let pool = test_pool().await;
    seed_source_event("it-a1", &pool).await;
    seed_source_event("it-a2", &pool).await;

    // First run: two singletons.
    replace_run_output(&[draft(&["it-a1"]), draft(&["it-a2"])], &[], &pool)
        .await
        .expect("first replace");

    // Second run: one merged canonical plus its decision.
    let outcome = replace_run_output(
        &[draft(&["it-a1", "it-a2"])],
        &[decision("it-a1", "it-a2")],
        &pool,
    )
    .await
    .expect("second replace");
    assert_eq!(outcome.canonicals, 1);
    assert_eq!(outcome.links, 2);
    assert_eq!(outcome.decisions, 1);

    let canonicals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM canonical_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(canonicals, 1, "no stale canonicals from the first run");

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM canonical_event_sources")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 2);

    // Each source is linked to at most one canonical.
    let max_links: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(cnt), 0) FROM
           (SELECT COUNT(*) AS cnt FROM canonical_event_sources GROUP BY source_event_id) t",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(max_links, 1);
}

#[tokio::test]
#[ignore]
async fn source_events_survive_the_replace_transaction() {
    let pool = test_pool().await;
    seed_source_event("it-keep", &pool).await;
    let before: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM source_events").fetch_one(&pool).await.unwrap();

    replace_run_output(&[draft(&["it-keep"])], &[], &pool).await.expect("replace");

    let after: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM source_events").fetch_one(&pool).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
#[ignore]
async fn matching_config_round_trips_through_the_store() {
    let pool = test_pool().await;

    let mut config = MatchingConfig::default();
    config.thresholds.high = 0.80;
    config_store::store_matching_config(&config, &pool).await.expect("store");

    let loaded = config_store::load_matching_config(&pool, None).await.expect("load");
    assert_eq!(loaded.thresholds.high, 0.80);
    assert_eq!(loaded.thresholds.low, 0.35);
}

#[tokio::test]
#[ignore]
async fn credential_round_trips_sealed() {
    let pool = test_pool().await;
    let key = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode([42u8; 32])
    };
    let sealer = CredentialSealer::from_base64_key(&key).unwrap();

    config_store::store_credential("sk-ant-test-credential", &sealer, &pool).await.expect("store");

    // The stored value is sealed, not plaintext.
    let raw: String =
        sqlx::query_scalar("SELECT value FROM matching_config WHERE key = 'llm_credential'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!raw.contains("sk-ant-test-credential"));

    let loaded = config_store::load_credential(&sealer, &pool).await.expect("load");
    assert_eq!(loaded.as_deref(), Some("sk-ant-test-credential"));
}
