use crate::normalize::NormalizedEvent;
use crate::similarity::token_sort_ratio;

/// Neutral score when neither event carries a description.
const BOTH_MISSING: f64 = 0.5;
/// Slightly pessimistic when only one side has text to compare.
const ONE_MISSING: f64 = 0.4;

/// Description similarity on the best available normalized text (long
/// description, falling back to the short one).
pub fn description_score(a: &NormalizedEvent, b: &NormalizedEvent) -> f64 {
    match (a.best_description(), b.best_description()) {
        (None, None) => BOTH_MISSING,
        (None, Some(_)) | (Some(_), None) => ONE_MISSING,
        (Some(da), Some(db)) => token_sort_ratio(da, db),
    }
}
