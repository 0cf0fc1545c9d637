use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use einklang_common::{
    EventDate, EventFlags, GeoPoint, Location, PipelineError, SourceEvent, SourceType,
};

/// Row shape of `source_events`; structured columns live in JSONB.
#[derive(Debug, sqlx::FromRow)]
pub struct SourceEventRow {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub highlights: Json<Vec<String>>,
    pub location: Json<Location>,
    pub geo: Option<Json<GeoPoint>>,
    pub source_code: String,
    pub source_type: String,
    pub categories: Json<Vec<String>>,
    pub flags: Json<EventFlags>,
    pub dates: Json<Vec<EventDate>>,
    pub ingested_at: DateTime<Utc>,
}

impl TryFrom<SourceEventRow> for SourceEvent {
    type Error = anyhow::Error;

    fn try_from(row: SourceEventRow) -> Result<Self> {
        if row.dates.0.is_empty() {
            anyhow::bail!("source event {} violates the non-empty dates invariant", row.id);
        }
        let source_type: SourceType =
            row.source_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        Ok(SourceEvent {
            id: row.id,
            file_id: row.file_id,
            title: row.title,
            short_description: row.short_description,
            description: row.description,
            highlights: row.highlights.0,
            location: row.location.0,
            geo: row.geo.map(|g| g.0),
            source_code: row.source_code,
            source_type,
            categories: row.categories.0,
            flags: row.flags.0,
            dates: row.dates.0,
            ingested_at: row.ingested_at,
        })
    }
}

/// Load every event of one publication file, id-ordered.
pub async fn load_by_file(file_id: &str, pool: &PgPool) -> Result<Vec<SourceEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, SourceEventRow>(
        "SELECT * FROM source_events WHERE file_id = $1 ORDER BY id",
    )
    .bind(file_id)
    .fetch_all(pool)
    .await
    .map_err(|e| PipelineError::StorageRead(e.to_string()))?;

    rows.into_iter()
        .map(|row| SourceEvent::try_from(row).map_err(|e| PipelineError::StorageRead(e.to_string())))
        .collect()
}

/// Load the full event store, id-ordered. Full re-clustering needs every
/// event, not only the freshly ingested files.
pub async fn load_all(pool: &PgPool) -> Result<Vec<SourceEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, SourceEventRow>("SELECT * FROM source_events ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| PipelineError::StorageRead(e.to_string()))?;

    rows.into_iter()
        .map(|row| SourceEvent::try_from(row).map_err(|e| PipelineError::StorageRead(e.to_string())))
        .collect()
}

/// Load every event outside the given files, id-ordered. The driver uses
/// this for the re-clustering remainder after the batch files were loaded
/// (or dead-lettered) individually.
pub async fn load_excluding_files(
    file_ids: &[String],
    pool: &PgPool,
) -> Result<Vec<SourceEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, SourceEventRow>(
        "SELECT * FROM source_events WHERE NOT (file_id = ANY($1)) ORDER BY id",
    )
    .bind(file_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| PipelineError::StorageRead(e.to_string()))?;

    rows.into_iter()
        .map(|row| SourceEvent::try_from(row).map_err(|e| PipelineError::StorageRead(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_source_event() {
        let row = SourceEventRow {
            id: "a1".to_string(),
            file_id: "f1".to_string(),
            title: "Fasnachtsumzug".to_string(),
            short_description: None,
            description: Some("Umzug durch die Stadt".to_string()),
            highlights: Json(vec!["Musik".to_string()]),
            location: Json(Location { city: Some("Offenburg".into()), ..Default::default() }),
            geo: Some(Json(GeoPoint { latitude: 48.47, longitude: 7.94, confidence: 0.9 })),
            source_code: "bz".to_string(),
            source_type: "terminliste".to_string(),
            categories: Json(vec!["fasnacht".to_string()]),
            flags: Json(EventFlags::default()),
            dates: Json(vec![EventDate::on("2026-02-14".parse().unwrap())]),
            ingested_at: Utc::now(),
        };
        let event = SourceEvent::try_from(row).unwrap();
        assert_eq!(event.source_type, SourceType::Terminliste);
        assert_eq!(event.location.city.as_deref(), Some("Offenburg"));
        assert_eq!(event.dates.len(), 1);
    }

    fn minimal_row(source_type: &str, dates: Vec<EventDate>) -> SourceEventRow {
        SourceEventRow {
            id: "a1".to_string(),
            file_id: "f1".to_string(),
            title: "t".to_string(),
            short_description: None,
            description: None,
            highlights: Json(Vec::new()),
            location: Json(Location::default()),
            geo: None,
            source_code: "bz".to_string(),
            source_type: source_type.to_string(),
            categories: Json(Vec::new()),
            flags: Json(EventFlags::default()),
            dates: Json(dates),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_source_type_is_rejected() {
        let row = minimal_row("plakat", vec![EventDate::on("2026-02-14".parse().unwrap())]);
        assert!(SourceEvent::try_from(row).is_err());
    }

    #[test]
    fn empty_dates_violate_the_invariant() {
        let row = minimal_row("artikel", Vec::new());
        assert!(SourceEvent::try_from(row).is_err());
    }
}
