use einklang_common::config::GeoConfig;

use crate::geo::haversine_km;
use crate::normalize::NormalizedEvent;
use crate::similarity::{is_prefix_of_either, token_sort_ratio};

/// Geographic proximity score.
///
/// Missing or untrusted coordinates yield the neutral score; absence of
/// data must not push a pair either way. Otherwise the score decays
/// linearly with great-circle distance, and very close pairs with clearly
/// different venue names are damped: two halls on the same square host two
/// different events more often than one.
pub fn geo_score(a: &NormalizedEvent, b: &NormalizedEvent, config: &GeoConfig) -> f64 {
    let (Some(geo_a), Some(geo_b)) = (&a.event.geo, &b.event.geo) else {
        return config.neutral_score;
    };
    if geo_a.confidence.min(geo_b.confidence) < config.min_confidence {
        return config.neutral_score;
    }

    let distance_km =
        haversine_km(geo_a.latitude, geo_a.longitude, geo_b.latitude, geo_b.longitude);
    let mut score = (1.0 - distance_km / config.max_distance_km).max(0.0);

    if distance_km < config.venue_match_distance_km {
        if let (Some(venue_a), Some(venue_b)) = (&a.venue_norm, &b.venue_norm) {
            let similarity = token_sort_ratio(venue_a, venue_b);
            if similarity < config.venue_similarity_threshold
                && !is_prefix_of_either(venue_a, venue_b)
            {
                score *= config.venue_mismatch_factor;
            }
        }
        // A missing venue name never penalizes.
    }

    score
}
