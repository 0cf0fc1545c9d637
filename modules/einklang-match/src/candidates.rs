//! Candidate-pair generation from blocking keys.

use std::collections::{BTreeMap, BTreeSet};

use einklang_common::canonical_pair;

use crate::blocking::blocking_keys;
use crate::normalize::NormalizedEvent;

/// Cross-source candidate pairs plus the blocking effectiveness stat.
#[derive(Debug)]
pub struct CandidateSet {
    /// Canonically ordered `(id_a, id_b)` pairs, sorted.
    pub pairs: Vec<(String, String)>,
    /// Percent of the full n·(n−1)/2 comparison space avoided.
    pub reduction_pct: f64,
}

/// Bucket events by blocking key and emit every cross-source pair within a
/// bucket. Same-source pairs are excluded (a publication does not duplicate
/// within itself); pairs reachable through several keys are emitted once.
pub fn candidate_pairs(events: &[NormalizedEvent]) -> CandidateSet {
    let mut buckets: BTreeMap<String, Vec<&NormalizedEvent>> = BTreeMap::new();
    for event in events {
        for key in blocking_keys(event) {
            buckets.entry(key).or_default().push(event);
        }
    }

    let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();
    for members in buckets.values() {
        if members.len() < 2 {
            continue;
        }
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (a, b) = (members[i], members[j]);
                if a.event.source_code == b.event.source_code {
                    continue;
                }
                if a.id() == b.id() {
                    continue;
                }
                pairs.insert(canonical_pair(a.id(), b.id()));
            }
        }
    }

    let n = events.len();
    let full_space = n.saturating_sub(1) * n / 2;
    let reduction_pct = if full_space == 0 {
        100.0
    } else {
        (1.0 - pairs.len() as f64 / full_space as f64) * 100.0
    };

    CandidateSet { pairs: pairs.into_iter().collect(), reduction_pct }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use chrono::Utc;
    use einklang_common::config::NormalizerConfig;
    use einklang_common::{EventDate, EventFlags, GeoPoint, Location, SourceEvent, SourceType};

    fn event(id: &str, source: &str, city: Option<&str>, geo: Option<(f64, f64)>, date: &str) -> NormalizedEvent {
        let ev = SourceEvent {
            id: id.to_string(),
            file_id: "f1".to_string(),
            title: "Termin".to_string(),
            short_description: None,
            description: None,
            highlights: Vec::new(),
            location: Location { city: city.map(String::from), ..Default::default() },
            geo: geo.map(|(latitude, longitude)| GeoPoint { latitude, longitude, confidence: 0.95 }),
            source_code: source.to_string(),
            source_type: SourceType::Terminliste,
            categories: Vec::new(),
            flags: EventFlags::default(),
            dates: vec![EventDate::on(date.parse().unwrap())],
            ingested_at: Utc::now(),
        };
        NormalizedEvent::new(ev, &Normalizer::new(&NormalizerConfig::default()))
    }

    #[test]
    fn cross_source_pair_in_shared_bucket() {
        let events = vec![
            event("a1", "bz", Some("Offenburg"), None, "2026-02-14"),
            event("b1", "azw", Some("Offenburg"), None, "2026-02-14"),
        ];
        let set = candidate_pairs(&events);
        assert_eq!(set.pairs, vec![("a1".to_string(), "b1".to_string())]);
    }

    #[test]
    fn same_source_pairs_are_excluded() {
        let events = vec![
            event("a1", "bz", Some("Offenburg"), None, "2026-02-14"),
            event("a2", "bz", Some("Offenburg"), None, "2026-02-14"),
        ];
        assert!(candidate_pairs(&events).pairs.is_empty());
    }

    #[test]
    fn singleton_bucket_yields_no_pairs() {
        let events = vec![
            event("a1", "bz", Some("Offenburg"), None, "2026-02-14"),
            event("b1", "azw", Some("Lahr"), None, "2026-02-14"),
        ];
        assert!(candidate_pairs(&events).pairs.is_empty());
    }

    #[test]
    fn pair_shared_via_multiple_keys_emitted_once() {
        // Same city bucket AND same geo grid bucket.
        let events = vec![
            event("a1", "bz", Some("Offenburg"), Some((48.4721, 7.9406)), "2026-02-14"),
            event("b1", "azw", Some("Offenburg"), Some((48.4698, 7.9391)), "2026-02-14"),
        ];
        let set = candidate_pairs(&events);
        assert_eq!(set.pairs.len(), 1);
    }

    #[test]
    fn pairs_are_canonically_ordered() {
        let events = vec![
            event("z9", "bz", Some("Offenburg"), None, "2026-02-14"),
            event("a1", "azw", Some("Offenburg"), None, "2026-02-14"),
        ];
        let set = candidate_pairs(&events);
        assert_eq!(set.pairs, vec![("a1".to_string(), "z9".to_string())]);
    }

    #[test]
    fn online_events_never_pair() {
        let events = vec![
            event("a1", "bz", None, None, "2026-02-14"),
            event("b1", "azw", None, None, "2026-02-14"),
        ];
        assert!(candidate_pairs(&events).pairs.is_empty());
    }

    #[test]
    fn reduction_covers_distant_buckets() {
        // 4 events in two disjoint buckets: 2 pairs possible out of 6.
        let events = vec![
            event("a1", "bz", Some("Offenburg"), None, "2026-02-14"),
            event("b1", "azw", Some("Offenburg"), None, "2026-02-14"),
            event("c1", "bz", Some("Lahr"), None, "2026-02-15"),
            event("d1", "azw", Some("Lahr"), None, "2026-02-15"),
        ];
        let set = candidate_pairs(&events);
        assert_eq!(set.pairs.len(), 2);
        assert!((set.reduction_pct - (1.0 - 2.0 / 6.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_reports_full_reduction() {
        let set = candidate_pairs(&[]);
        assert!(set.pairs.is_empty());
        assert_eq!(set.reduction_pct, 100.0);
    }
}
