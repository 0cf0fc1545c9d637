//! The four pairwise signal scorers.
//!
//! Each scorer is a pure, symmetric function of two normalized events and
//! its config slice, returning a value in [0, 1].

mod date;
mod description;
mod geo;
mod title;

pub use date::date_score;
pub use description::description_score;
pub use geo::geo_score;
pub use title::title_score;

use einklang_common::MatchingConfig;

use crate::normalize::NormalizedEvent;

/// All four signal scores for one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalScores {
    pub date: f64,
    pub geo: f64,
    pub title: f64,
    pub description: f64,
}

/// Run every scorer for one pair.
pub fn score_pair(a: &NormalizedEvent, b: &NormalizedEvent, config: &MatchingConfig) -> SignalScores {
    SignalScores {
        date: date_score(a, b, &config.date),
        geo: geo_score(a, b, &config.geo),
        title: title_score(a, b, &config.title),
        description: description_score(a, b),
    }
}
