//! Canonical synthesis: one record per cluster, each field picked from the
//! best contributing source, with provenance for every choice.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use einklang_common::config::{CanonicalConfig, FieldStrategy};
use einklang_common::{
    CanonicalDraft, EventDate, EventFlags, GeoPoint, Location, SourceType, UNION_ALL_SOURCES,
};

use crate::cluster::EventCluster;
use crate::normalize::NormalizedEvent;

/// Build the canonical draft for one cluster. Members are visited in id
/// order, so every tie breaks deterministically toward the smaller id.
pub fn synthesize(
    cluster: &EventCluster,
    events_by_id: &BTreeMap<&str, &NormalizedEvent>,
    config: &CanonicalConfig,
) -> CanonicalDraft {
    let members: Vec<&NormalizedEvent> = cluster
        .members
        .iter()
        .filter_map(|id| events_by_id.get(id.as_str()).copied())
        .collect();
    debug_assert_eq!(members.len(), cluster.members.len());

    let mut provenance: BTreeMap<String, String> = BTreeMap::new();

    let strategy =
        |field: &str, default: FieldStrategy| *config.field_strategies.get(field).unwrap_or(&default);

    // --- title ---
    let title_pick = match strategy("title", FieldStrategy::LongestMin10) {
        FieldStrategy::Longest | FieldStrategy::LongestNonEmpty => pick_longest(&members, |e| {
            Some(e.event.title.as_str()).filter(|t| !t.is_empty())
        }),
        _ => pick_title_longest_min10(&members),
    };
    let (title, title_source) = title_pick
        .map(|(e, t)| (t.to_string(), e.id().to_string()))
        .unwrap_or_default();
    provenance.insert("title".to_string(), title_source);

    // --- descriptions ---
    let short_description = pick_longest(&members, |e| {
        e.event.short_description.as_deref().filter(|s| !s.trim().is_empty())
    });
    if let Some((e, _)) = &short_description {
        provenance.insert("short_description".to_string(), e.id().to_string());
    }
    let description = pick_longest(&members, |e| {
        e.event.description.as_deref().filter(|s| !s.trim().is_empty())
    });
    if let Some((e, _)) = &description {
        provenance.insert("description".to_string(), e.id().to_string());
    }

    // --- highlights: union preserving first-seen order ---
    let mut highlights: Vec<String> = Vec::new();
    for member in &members {
        for h in &member.event.highlights {
            if !highlights.contains(h) {
                highlights.push(h.clone());
            }
        }
    }
    if !highlights.is_empty() {
        provenance.insert("highlights".to_string(), UNION_ALL_SOURCES.to_string());
    }

    // --- location: most complete source for name/street/zipcode/district ---
    let location_source = members
        .iter()
        .max_by(|a, b| {
            a.event
                .location
                .completeness()
                .cmp(&b.event.location.completeness())
                // Equal completeness prefers the smaller id.
                .then_with(|| b.id().cmp(a.id()))
        })
        .copied();
    let mut location = location_source.map(|e| e.event.location.clone()).unwrap_or_default();
    if let Some(src) = location_source {
        for field in ["location_name", "location_street", "location_zipcode", "location_district"] {
            provenance.insert(field.to_string(), src.id().to_string());
        }
    }

    // --- city: mode, ties broken by source-type preference ---
    if let Some((city, source)) = pick_city_mode(&members, &config.source_type_preference) {
        location.city = Some(city);
        provenance.insert("location_city".to_string(), source);
    }

    // --- geo: highest confidence ---
    let geo: Option<GeoPoint> = members
        .iter()
        .filter_map(|e| e.event.geo.map(|g| (e, g)))
        .max_by(|(ea, ga), (eb, gb)| {
            ga.confidence
                .partial_cmp(&gb.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| eb.id().cmp(ea.id()))
        })
        .map(|(e, g)| {
            provenance.insert("geo".to_string(), e.id().to_string());
            g
        });

    // --- dates: union of expanded dates, earliest/latest times per day ---
    let dates = union_dates(&members);
    provenance.insert("dates".to_string(), UNION_ALL_SOURCES.to_string());

    // --- categories: union ---
    let mut categories: Vec<String> =
        members.iter().flat_map(|e| e.event.categories.iter().cloned()).collect();
    categories.sort();
    categories.dedup();
    if !categories.is_empty() {
        provenance.insert("categories".to_string(), UNION_ALL_SOURCES.to_string());
    }

    // --- flags: logical OR ---
    let flags = members.iter().fold(EventFlags::default(), |acc, e| acc.or(e.event.flags));
    for field in ["is_family", "is_child_focused", "admission_free"] {
        provenance.insert(field.to_string(), UNION_ALL_SOURCES.to_string());
    }

    CanonicalDraft {
        title,
        short_description: short_description.map(|(_, s)| s.to_string()),
        description: description.map(|(_, s)| s.to_string()),
        highlights,
        location,
        geo,
        categories,
        flags,
        dates,
        source_ids: cluster.members.clone(),
        source_count: cluster.members.len() as u32,
        match_confidence: cluster.mean_edge_weight,
        needs_review: cluster.needs_review,
        ai_assisted: cluster.ai_assisted,
        field_provenance: provenance,
    }
}

/// Longest candidate by character count; first member wins ties (members
/// are id-ordered).
fn pick_longest<'a>(
    members: &[&'a NormalizedEvent],
    extract: impl Fn(&'a NormalizedEvent) -> Option<&'a str>,
) -> Option<(&'a NormalizedEvent, &'a str)> {
    let mut best: Option<(&NormalizedEvent, &str)> = None;
    for &member in members {
        let Some(value) = extract(member) else { continue };
        let better = match best {
            None => true,
            Some((_, current)) => value.chars().count() > current.chars().count(),
        };
        if better {
            best = Some((member, value));
        }
    }
    best
}

/// Longest title of at least 10 characters; else longest overall.
fn pick_title_longest_min10<'a>(
    members: &[&'a NormalizedEvent],
) -> Option<(&'a NormalizedEvent, &'a str)> {
    pick_longest(members, |e| {
        Some(e.event.title.as_str()).filter(|t| t.chars().count() >= 10)
    })
    .or_else(|| pick_longest(members, |e| Some(e.event.title.as_str()).filter(|t| !t.is_empty())))
}

/// Most frequent city; ties prefer the earlier source type in the
/// preference list, then the smaller id. Returns the city and the id of the
/// first contributing source.
fn pick_city_mode(
    members: &[&NormalizedEvent],
    preference: &[SourceType],
) -> Option<(String, String)> {
    let rank = |st: SourceType| preference.iter().position(|p| *p == st).unwrap_or(preference.len());

    let mut counts: BTreeMap<&str, (usize, usize, &str)> = BTreeMap::new();
    for member in members {
        let Some(city) = member.event.location.city.as_deref() else { continue };
        let entry = counts.entry(city).or_insert((0, usize::MAX, member.id()));
        entry.0 += 1;
        let r = rank(member.event.source_type);
        if r < entry.1 {
            entry.1 = r;
        }
    }

    counts
        .into_iter()
        .min_by(|(_, (ca, ra, _)), (_, (cb, rb, _))| {
            cb.cmp(ca).then(ra.cmp(rb)) // highest count, then best preference rank
        })
        .map(|(city, (_, _, source))| (city.to_string(), source.to_string()))
}

/// Union of all expanded dates. For each concrete date the earliest start
/// and latest end time contributed by any covering entry are kept.
fn union_dates(members: &[&NormalizedEvent]) -> Vec<EventDate> {
    let mut by_date: BTreeMap<NaiveDate, (Option<NaiveTime>, Option<NaiveTime>)> = BTreeMap::new();
    for member in members {
        for entry in &member.event.dates {
            for date in entry.expand() {
                let slot = by_date.entry(date).or_insert((None, None));
                slot.0 = min_time(slot.0, entry.start_time);
                slot.1 = max_time(slot.1, entry.end_time);
            }
        }
    }

    by_date
        .into_iter()
        .map(|(date, (start_time, end_time))| EventDate { date, start_time, end_time, end_date: None })
        .collect()
}

fn min_time(a: Option<NaiveTime>, b: Option<NaiveTime>) -> Option<NaiveTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn max_time(a: Option<NaiveTime>, b: Option<NaiveTime>) -> Option<NaiveTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}
