//! Blocking-key generation.
//!
//! Candidate comparison is restricted to events sharing at least one key:
//! `dc|<date>|<city>` for date+city, `dg|<date>|<lat>|<lon>` for date plus a
//! ~1km geo grid cell. Keys are built from the listed date entries, not the
//! expanded ranges.

use std::collections::BTreeSet;

use crate::geo::coarsen_coords;
use crate::normalize::NormalizedEvent;

/// Minimum geocoding confidence for an event's coordinates to produce grid keys.
const GEO_KEY_MIN_CONFIDENCE: f64 = 0.80;

/// All blocking keys for one event. Online events (no city, no geo) get
/// none and can only be merged through review.
pub fn blocking_keys(event: &NormalizedEvent) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();

    for entry in &event.event.dates {
        if let Some(city) = &event.city_lower {
            keys.insert(format!("dc|{}|{}", entry.date, city));
        }
        if let Some(geo) = &event.event.geo {
            if geo.confidence >= GEO_KEY_MIN_CONFIDENCE {
                let (lat, lon) = coarsen_coords(geo.latitude, geo.longitude);
                keys.insert(format!("dg|{}|{lat:.2}|{lon:.2}", entry.date));
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use chrono::Utc;
    use einklang_common::config::NormalizerConfig;
    use einklang_common::{EventDate, EventFlags, GeoPoint, Location, SourceEvent, SourceType};

    fn event(city: Option<&str>, geo: Option<GeoPoint>, dates: &[&str]) -> NormalizedEvent {
        let ev = SourceEvent {
            id: "e1".to_string(),
            file_id: "f1".to_string(),
            title: "Testtermin".to_string(),
            short_description: None,
            description: None,
            highlights: Vec::new(),
            location: Location { city: city.map(String::from), ..Default::default() },
            geo,
            source_code: "bz".to_string(),
            source_type: SourceType::Terminliste,
            categories: Vec::new(),
            flags: EventFlags::default(),
            dates: dates.iter().map(|d| EventDate::on(d.parse().unwrap())).collect(),
            ingested_at: Utc::now(),
        };
        NormalizedEvent::new(ev, &Normalizer::new(&NormalizerConfig::default()))
    }

    #[test]
    fn city_key_per_date() {
        let keys = blocking_keys(&event(Some("Offenburg"), None, &["2026-02-14", "2026-02-15"]));
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["dc|2026-02-14|offenburg", "dc|2026-02-15|offenburg"]
        );
    }

    #[test]
    fn geo_key_uses_two_decimal_grid() {
        let geo = GeoPoint { latitude: 48.4721, longitude: 7.9406, confidence: 0.95 };
        let keys = blocking_keys(&event(None, Some(geo), &["2026-02-14"]));
        assert!(keys.contains("dg|2026-02-14|48.47|7.94"), "keys: {keys:?}");
    }

    #[test]
    fn low_confidence_geo_produces_no_grid_key() {
        let geo = GeoPoint { latitude: 48.4721, longitude: 7.9406, confidence: 0.79 };
        let keys = blocking_keys(&event(None, Some(geo), &["2026-02-14"]));
        assert!(keys.is_empty());
    }

    #[test]
    fn confidence_boundary_is_inclusive() {
        let geo = GeoPoint { latitude: 48.4721, longitude: 7.9406, confidence: 0.80 };
        let keys = blocking_keys(&event(None, Some(geo), &["2026-02-14"]));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn city_and_geo_both_contribute() {
        let geo = GeoPoint { latitude: 48.4721, longitude: 7.9406, confidence: 0.95 };
        let keys = blocking_keys(&event(Some("Offenburg"), Some(geo), &["2026-02-14"]));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn online_event_gets_no_keys() {
        assert!(blocking_keys(&event(None, None, &["2026-02-14"])).is_empty());
    }
}
