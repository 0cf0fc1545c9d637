//! Score combination and the deterministic decision.

use einklang_common::config::ScoringWeights;
use einklang_common::{canonical_pair, Decision, DecisionTier, MatchDecision, MatchingConfig};

use crate::normalize::NormalizedEvent;
use crate::score::SignalScores;

/// Combine the four signals and decide the pair.
///
/// Rules, in order: a title score below the veto forces `ambiguous`
/// (coincident events at the same venue must not merge on venue strength
/// alone); then the combined score partitions into match / no-match /
/// ambiguous.
pub fn combine_and_decide(
    a: &NormalizedEvent,
    b: &NormalizedEvent,
    scores: SignalScores,
    config: &MatchingConfig,
) -> MatchDecision {
    let weights = effective_weights(a, b, config);
    let combined = weights.date * scores.date
        + weights.geo * scores.geo
        + weights.title * scores.title
        + weights.description * scores.description;

    let decision = if scores.title < config.thresholds.title_veto {
        Decision::Ambiguous
    } else if combined >= config.thresholds.high {
        Decision::Match
    } else if combined <= config.thresholds.low {
        Decision::NoMatch
    } else {
        Decision::Ambiguous
    };

    let (id_a, id_b) = canonical_pair(a.id(), b.id());
    MatchDecision {
        id_a,
        id_b,
        date_score: scores.date,
        geo_score: scores.geo,
        title_score: scores.title,
        description_score: scores.description,
        combined_score: combined,
        decision,
        tier: DecisionTier::Deterministic,
        reasoning: None,
    }
}

/// Global weights, or the override for the first shared category in the
/// configured priority order.
fn effective_weights<'c>(
    a: &NormalizedEvent,
    b: &NormalizedEvent,
    config: &'c MatchingConfig,
) -> &'c ScoringWeights {
    for category in &config.category_weights.priority {
        if a.event.categories.iter().any(|c| c == category)
            && b.event.categories.iter().any(|c| c == category)
        {
            if let Some(weights) = config.category_weights.overrides.get(category) {
                return weights;
            }
        }
    }
    &config.scoring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::score::SignalScores;
    use chrono::Utc;
    use einklang_common::config::NormalizerConfig;
    use einklang_common::{EventDate, EventFlags, Location, SourceEvent, SourceType};

    fn event(id: &str, categories: &[&str]) -> NormalizedEvent {
        let ev = SourceEvent {
            id: id.to_string(),
            file_id: "f".to_string(),
            title: "Termin".to_string(),
            short_description: None,
            description: None,
            highlights: Vec::new(),
            location: Location::default(),
            geo: None,
            source_code: "bz".to_string(),
            source_type: SourceType::Terminliste,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            flags: EventFlags::default(),
            dates: vec![EventDate::on("2026-02-14".parse().unwrap())],
            ingested_at: Utc::now(),
        };
        NormalizedEvent::new(ev, &Normalizer::new(&NormalizerConfig::default()))
    }

    fn scores(date: f64, geo: f64, title: f64, description: f64) -> SignalScores {
        SignalScores { date, geo, title, description }
    }

    #[test]
    fn strong_pair_is_a_match() {
        let d = combine_and_decide(
            &event("a", &[]),
            &event("b", &[]),
            scores(1.0, 1.0, 1.0, 1.0),
            &MatchingConfig::default(),
        );
        assert_eq!(d.decision, Decision::Match);
        assert!((d.combined_score - 1.0).abs() < 1e-9);
        assert_eq!(d.tier, DecisionTier::Deterministic);
    }

    #[test]
    fn weak_pair_is_no_match() {
        let d = combine_and_decide(
            &event("a", &[]),
            &event("b", &[]),
            scores(0.0, 0.2, 0.5, 0.2),
            &MatchingConfig::default(),
        );
        // combined = 0.05 + 0.15 + 0.03 = 0.23 <= 0.35
        assert_eq!(d.decision, Decision::NoMatch);
    }

    #[test]
    fn middle_band_is_ambiguous() {
        let d = combine_and_decide(
            &event("a", &[]),
            &event("b", &[]),
            scores(0.5, 0.5, 0.6, 0.5),
            &MatchingConfig::default(),
        );
        // combined = 0.15 + 0.125 + 0.18 + 0.075 = 0.53
        assert_eq!(d.decision, Decision::Ambiguous);
    }

    #[test]
    fn title_veto_overrides_high_combined() {
        // Everything else perfect, title just below the veto.
        let d = combine_and_decide(
            &event("a", &[]),
            &event("b", &[]),
            scores(1.0, 1.0, 0.44, 1.0),
            &MatchingConfig::default(),
        );
        assert!(d.combined_score >= 0.75, "combined = {}", d.combined_score);
        assert_eq!(d.decision, Decision::Ambiguous, "veto must win over the combined score");
    }

    #[test]
    fn title_at_veto_threshold_is_not_vetoed() {
        let d = combine_and_decide(
            &event("a", &[]),
            &event("b", &[]),
            scores(1.0, 1.0, 0.45, 1.0),
            &MatchingConfig::default(),
        );
        assert_eq!(d.decision, Decision::Match);
    }

    #[test]
    fn boundary_scores_are_inclusive() {
        let cfg = MatchingConfig::default();
        // Exactly the high threshold.
        let d = combine_and_decide(&event("a", &[]), &event("b", &[]), scores(1.0, 1.0, 0.5, 1.0), &cfg);
        // combined = 0.30 + 0.25 + 0.15 + 0.15 = 0.85 -> match; craft exact 0.75:
        assert_eq!(d.decision, Decision::Match);
        let d = combine_and_decide(&event("a", &[]), &event("b", &[]), scores(0.75, 0.75, 0.75, 0.75), &cfg);
        assert!((d.combined_score - 0.75).abs() < 1e-9);
        assert_eq!(d.decision, Decision::Match);
    }

    #[test]
    fn shared_category_override_applies() {
        let cfg = MatchingConfig::default();
        // fasnacht weights: date 0.30, geo 0.35, title 0.20, description 0.15.
        let d = combine_and_decide(
            &event("a", &["fasnacht"]),
            &event("b", &["fasnacht", "musik"]),
            scores(1.0, 1.0, 0.5, 0.0),
            &cfg,
        );
        assert!((d.combined_score - (0.30 + 0.35 + 0.10)).abs() < 1e-9);
    }

    #[test]
    fn unshared_category_keeps_global_weights() {
        let cfg = MatchingConfig::default();
        let d = combine_and_decide(
            &event("a", &["fasnacht"]),
            &event("b", &["musik"]),
            scores(1.0, 1.0, 0.5, 0.0),
            &cfg,
        );
        assert!((d.combined_score - (0.30 + 0.25 + 0.15)).abs() < 1e-9);
    }

    #[test]
    fn priority_order_picks_the_first_shared_category() {
        let cfg = MatchingConfig::default();
        // Both shared; "fasnacht" precedes "versammlung" in the priority list.
        let d = combine_and_decide(
            &event("a", &["versammlung", "fasnacht"]),
            &event("b", &["fasnacht", "versammlung"]),
            scores(0.0, 0.0, 1.0, 0.0),
            &cfg,
        );
        assert!((d.combined_score - 0.20).abs() < 1e-9, "fasnacht title weight 0.20");
    }

    #[test]
    fn ids_are_canonically_ordered() {
        let d = combine_and_decide(
            &event("z9", &[]),
            &event("a1", &[]),
            scores(0.5, 0.5, 0.5, 0.5),
            &MatchingConfig::default(),
        );
        assert_eq!((d.id_a.as_str(), d.id_b.as_str()), ("a1", "z9"));
    }
}
