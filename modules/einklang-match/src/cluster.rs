//! Connected-component clustering over match decisions.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use einklang_common::config::ClusterConfig;
use einklang_common::{Decision, DecisionTier, MatchDecision};

use crate::normalize::NormalizedEvent;

/// One connected component of the match graph, with the coherence verdict
/// and the AI provenance flags the synthesizer needs.
#[derive(Debug, Clone)]
pub struct EventCluster {
    /// Member event ids, sorted.
    pub members: Vec<String>,
    /// Mean combined score across every evaluated intra-component pair
    /// (a non-match evaluation pulls the mean down); 1.0 for singletons.
    pub mean_edge_weight: f64,
    /// Distinct concrete dates across all members.
    pub date_spread: usize,
    /// Set when any coherence check failed, or when an intra-cluster pair
    /// ended non-match because its AI resolution failed.
    pub needs_review: bool,
    /// Any intra-cluster decision carries an AI verdict (tier `ai` or
    /// `ai_low_confidence`); failed resolutions do not count.
    pub ai_assisted: bool,
}

impl EventCluster {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Union-find with path compression.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Build clusters from the final decisions. Every event is a node, so
/// unmatched events survive as singletons. Components are returned ordered
/// by their smallest member id.
pub fn build_clusters(
    events: &[NormalizedEvent],
    decisions: &[MatchDecision],
    config: &ClusterConfig,
) -> Vec<EventCluster> {
    let index: HashMap<&str, usize> =
        events.iter().enumerate().map(|(i, e)| (e.id(), i)).collect();

    let mut sets = DisjointSet::new(events.len());
    for decision in decisions {
        if decision.decision != Decision::Match {
            continue;
        }
        let (Some(&ia), Some(&ib)) = (index.get(decision.id_a.as_str()), index.get(decision.id_b.as_str()))
        else {
            continue;
        };
        sets.union(ia, ib);
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..events.len() {
        components.entry(sets.find(i)).or_default().push(i);
    }

    let mut clusters: Vec<EventCluster> = components
        .into_values()
        .map(|indices| assess_component(events, decisions, indices, config))
        .collect();
    clusters.sort_by(|a, b| a.members[0].cmp(&b.members[0]));
    clusters
}

/// Compute per-component stats and run the coherence checks cheapest-first:
/// size, then mean similarity, then date spread.
fn assess_component(
    events: &[NormalizedEvent],
    decisions: &[MatchDecision],
    indices: Vec<usize>,
    config: &ClusterConfig,
) -> EventCluster {
    let mut members: Vec<String> = indices.iter().map(|&i| events[i].id().to_string()).collect();
    members.sort();
    let member_set: BTreeSet<&str> = members.iter().map(String::as_str).collect();

    // Intra-cluster decisions: both endpoints inside the component.
    let mut edge_weights = Vec::new();
    let mut ai_assisted = false;
    let mut ai_failed_edge = false;
    for decision in decisions {
        if !member_set.contains(decision.id_a.as_str()) || !member_set.contains(decision.id_b.as_str())
        {
            continue;
        }
        // Failed resolutions (ai_unexpected) force review below but do not
        // count as AI assistance.
        if matches!(decision.tier, DecisionTier::Ai | DecisionTier::AiLowConfidence) {
            ai_assisted = true;
        }
        edge_weights.push(decision.combined_score);
        if decision.decision != Decision::Match && decision.tier == DecisionTier::AiUnexpected {
            ai_failed_edge = true;
        }
    }

    let mean_edge_weight = if edge_weights.is_empty() {
        1.0
    } else {
        edge_weights.iter().sum::<f64>() / edge_weights.len() as f64
    };

    let date_spread: BTreeSet<_> =
        indices.iter().flat_map(|&i| events[i].expanded_dates()).collect();
    let date_spread = date_spread.len();

    let incoherent = if members.len() > config.max_cluster_size {
        warn!(size = members.len(), max = config.max_cluster_size, "cluster exceeds max size");
        true
    } else if members.len() > 1 && mean_edge_weight < config.min_internal_similarity {
        true
    } else {
        members.len() > 1 && date_spread > config.max_date_spread
    };

    EventCluster {
        members,
        mean_edge_weight,
        date_spread,
        needs_review: incoherent || ai_failed_edge,
        ai_assisted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use chrono::Utc;
    use einklang_common::config::NormalizerConfig;
    use einklang_common::{EventDate, EventFlags, Location, SourceEvent, SourceType};

    fn event(id: &str, dates: &[&str]) -> NormalizedEvent {
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
            categories: Vec::new(),
            flags: EventFlags::default(),
            dates: dates.iter().map(|d| EventDate::on(d.parse().unwrap())).collect(),
            ingested_at: Utc::now(),
        };
        NormalizedEvent::new(ev, &Normalizer::new(&NormalizerConfig::default()))
    }

    fn decision(a: &str, b: &str, decision: Decision, combined: f64, tier: DecisionTier) -> MatchDecision {
        MatchDecision {
            id_a: a.to_string(),
            id_b: b.to_string(),
            date_score: 0.0,
            geo_score: 0.0,
            title_score: 0.0,
            description_score: 0.0,
            combined_score: combined,
            decision,
            tier,
            reasoning: None,
        }
    }

    fn cfg() -> ClusterConfig {
        ClusterConfig::default()
    }

    #[test]
    fn unmatched_events_stay_singletons() {
        let events = vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"])];
        let decisions = vec![decision("a", "b", Decision::NoMatch, 0.2, DecisionTier::Deterministic)];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.is_singleton()));
        assert!(clusters.iter().all(|c| c.mean_edge_weight == 1.0));
    }

    #[test]
    fn match_edge_joins_a_pair() {
        let events = vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"])];
        let decisions = vec![decision("a", "b", Decision::Match, 0.9, DecisionTier::Deterministic)];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec!["a", "b"]);
        assert!((clusters[0].mean_edge_weight - 0.9).abs() < 1e-9);
        assert!(!clusters[0].needs_review);
    }

    #[test]
    fn transitive_edges_form_one_component() {
        let events =
            vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"]), event("c", &["2026-02-14"])];
        let decisions = vec![
            decision("a", "b", Decision::Match, 0.76, DecisionTier::Deterministic),
            decision("b", "c", Decision::Match, 0.76, DecisionTier::Deterministic),
        ];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec!["a", "b", "c"]);
    }

    #[test]
    fn mean_weight_averages_every_evaluated_pair() {
        // a-b and b-c match at 0.76; a-c was evaluated no-match at 0.34 and
        // still drags the component mean down.
        let events =
            vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"]), event("c", &["2026-02-14"])];
        let decisions = vec![
            decision("a", "b", Decision::Match, 0.76, DecisionTier::Deterministic),
            decision("b", "c", Decision::Match, 0.76, DecisionTier::Deterministic),
            decision("a", "c", Decision::NoMatch, 0.34, DecisionTier::Deterministic),
        ];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert!((clusters[0].mean_edge_weight - 0.62).abs() < 1e-9);
        // Coherent at the 0.40 default, flagged at a 0.65 bar.
        assert!(!clusters[0].needs_review);
        let mut strict = cfg();
        strict.min_internal_similarity = 0.65;
        let clusters = build_clusters(&events, &decisions, &strict);
        assert!(clusters[0].needs_review);
    }

    #[test]
    fn low_internal_similarity_flags_cluster() {
        let events = vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"])];
        let decisions = vec![decision("a", "b", Decision::Match, 0.39, DecisionTier::Deterministic)];
        let mut config = cfg();
        config.min_internal_similarity = 0.40;
        let clusters = build_clusters(&events, &decisions, &config);
        assert!(clusters[0].needs_review);
    }

    #[test]
    fn oversized_cluster_is_flagged() {
        let ids: Vec<String> = (0..4).map(|i| format!("e{i}")).collect();
        let events: Vec<_> = ids.iter().map(|id| event(id, &["2026-02-14"])).collect();
        let decisions: Vec<_> = ids
            .windows(2)
            .map(|w| decision(&w[0], &w[1], Decision::Match, 0.9, DecisionTier::Deterministic))
            .collect();
        let mut config = cfg();
        config.max_cluster_size = 3;
        let clusters = build_clusters(&events, &decisions, &config);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].needs_review);
    }

    #[test]
    fn wide_date_spread_is_flagged() {
        let events = vec![
            event("a", &["2026-02-14", "2026-02-15"]),
            event("b", &["2026-02-16", "2026-02-17"]),
        ];
        let decisions = vec![decision("a", "b", Decision::Match, 0.9, DecisionTier::Deterministic)];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert_eq!(clusters[0].date_spread, 4);
        assert!(clusters[0].needs_review);
    }

    #[test]
    fn singleton_with_many_dates_is_not_flagged() {
        // The date-spread check exists to catch incoherent merges, not
        // long-running single-source events.
        let events = vec![event("a", &["2026-02-14", "2026-02-15", "2026-02-16", "2026-02-17"])];
        let clusters = build_clusters(&events, &[], &cfg());
        assert!(!clusters[0].needs_review);
    }

    #[test]
    fn ai_tier_marks_cluster_assisted() {
        let events = vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"])];
        let decisions = vec![decision("a", "b", Decision::Match, 0.72, DecisionTier::Ai)];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert!(clusters[0].ai_assisted);
        assert!(!clusters[0].needs_review);
    }

    #[test]
    fn low_confidence_tier_marks_cluster_assisted() {
        let events = vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"])];
        let decisions =
            vec![decision("a", "b", Decision::Match, 0.72, DecisionTier::AiLowConfidence)];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert!(clusters[0].ai_assisted);
    }

    #[test]
    fn failed_ai_edge_inside_cluster_forces_review() {
        // a-b and b-c merged; a-c stayed ambiguous because its AI call failed.
        // The failure forces review but is not AI assistance.
        let events =
            vec![event("a", &["2026-02-14"]), event("b", &["2026-02-14"]), event("c", &["2026-02-14"])];
        let decisions = vec![
            decision("a", "b", Decision::Match, 0.8, DecisionTier::Deterministic),
            decision("b", "c", Decision::Match, 0.8, DecisionTier::Deterministic),
            decision("a", "c", Decision::Ambiguous, 0.7, DecisionTier::AiUnexpected),
        ];
        let clusters = build_clusters(&events, &decisions, &cfg());
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].needs_review);
        assert!(!clusters[0].ai_assisted);
    }

    #[test]
    fn components_are_ordered_by_smallest_member() {
        let events = vec![event("z", &["2026-02-14"]), event("a", &["2026-02-14"]), event("m", &["2026-02-14"])];
        let clusters = build_clusters(&events, &[], &cfg());
        let firsts: Vec<_> = clusters.iter().map(|c| c.members[0].as_str()).collect();
        assert_eq!(firsts, vec!["a", "m", "z"]);
    }
}
