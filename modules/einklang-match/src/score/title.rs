use einklang_common::config::TitleConfig;

use crate::normalize::NormalizedEvent;
use crate::similarity::{token_set_ratio, token_sort_ratio};

/// Title similarity on normalized titles.
///
/// The token-sort ratio carries the signal; in the mid band where word
/// order and extra words blur the picture, it is blended with the
/// token-set ratio. A journalistic headline against a calendar listing
/// shares few surface words, so cross-source-type pairs lean harder on the
/// set ratio.
pub fn title_score(a: &NormalizedEvent, b: &NormalizedEvent, config: &TitleConfig) -> f64 {
    let sort_ratio = token_sort_ratio(&a.title_norm, &b.title_norm);

    if sort_ratio < config.blend_lower || sort_ratio > config.blend_upper {
        return sort_ratio;
    }

    let (primary, secondary) = if a.event.source_type == b.event.source_type {
        (config.primary_weight, config.secondary_weight)
    } else {
        (config.cross_primary_weight, config.cross_secondary_weight)
    };

    let set_ratio = token_set_ratio(&a.title_norm, &b.title_norm);
    primary * sort_ratio + secondary * set_ratio
}
