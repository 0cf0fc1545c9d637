use chrono::NaiveDate;

use einklang_common::config::DateConfig;

use crate::normalize::NormalizedEvent;

/// Date overlap score: Jaccard similarity of the expanded date sets, damped
/// by how far apart the start times lie on the earliest shared date.
///
/// No shared date means 0. When no shared date has a start time on both
/// sides, the time factor stays 1.0 (benefit of the doubt for listings
/// without times).
pub fn date_score(a: &NormalizedEvent, b: &NormalizedEvent, config: &DateConfig) -> f64 {
    let dates_a = a.expanded_dates();
    let dates_b = b.expanded_dates();
    if dates_a.is_empty() || dates_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<NaiveDate> = dates_a.intersection(&dates_b).copied().collect();
    if intersection.is_empty() {
        return 0.0;
    }
    let union_len = dates_a.union(&dates_b).count();
    let jaccard = intersection.len() as f64 / union_len as f64;

    jaccard * time_proximity_factor(a, b, &intersection, config)
}

/// Time factor from the earliest overlapping date where both events carry a
/// start time. Tiers: within tolerance 1.0, close `close_factor`, within the
/// gap-penalty window `far_factor`, beyond it `time_gap_penalty_factor`.
fn time_proximity_factor(
    a: &NormalizedEvent,
    b: &NormalizedEvent,
    overlap: &[NaiveDate],
    config: &DateConfig,
) -> f64 {
    for &date in overlap {
        let (Some(ta), Some(tb)) = (a.start_time_on(date), b.start_time_on(date)) else {
            continue;
        };
        let delta_minutes = (ta - tb).num_minutes().abs();
        return if delta_minutes <= config.time_tolerance_minutes {
            1.0
        } else if delta_minutes <= config.time_close_minutes {
            config.close_factor
        } else if delta_minutes <= config.time_gap_penalty_hours * 60 {
            config.far_factor
        } else {
            config.time_gap_penalty_factor
        };
    }
    1.0
}
