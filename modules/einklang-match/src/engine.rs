//! Pure orchestration of the matching stages.
//!
//! Everything here is deterministic in the input events and config; the
//! async driver wraps these functions with storage and AI resolution.

use std::collections::BTreeMap;

use einklang_common::{CanonicalDraft, MatchDecision, MatchingConfig, SourceEvent};

use crate::candidates::{candidate_pairs, CandidateSet};
use crate::cluster::{build_clusters, EventCluster};
use crate::combine::combine_and_decide;
use crate::normalize::{NormalizedEvent, Normalizer};
use crate::score::score_pair;
use crate::synthesize::synthesize;

/// Normalize raw source events for one run.
pub fn normalize_events(events: Vec<SourceEvent>, config: &MatchingConfig) -> Vec<NormalizedEvent> {
    let normalizer = Normalizer::new(&config.normalizer);
    let mut normalized: Vec<NormalizedEvent> =
        events.into_iter().map(|e| NormalizedEvent::new(e, &normalizer)).collect();
    // Id order everywhere downstream keeps the pipeline deterministic.
    normalized.sort_by(|a, b| a.id().cmp(b.id()));
    normalized
}

/// Generate candidates and score every pair deterministically.
/// Decisions come back in canonical pair order, one per candidate pair.
pub fn score_candidates(
    events: &[NormalizedEvent],
    config: &MatchingConfig,
) -> (CandidateSet, Vec<MatchDecision>) {
    let by_id: BTreeMap<&str, &NormalizedEvent> = events.iter().map(|e| (e.id(), e)).collect();

    let candidates = candidate_pairs(events);
    let decisions = candidates
        .pairs
        .iter()
        .map(|(id_a, id_b)| {
            let a = by_id[id_a.as_str()];
            let b = by_id[id_b.as_str()];
            combine_and_decide(a, b, score_pair(a, b, config), config)
        })
        .collect();

    (candidates, decisions)
}

/// Cluster the final decisions and synthesize one canonical draft per
/// cluster.
pub fn assemble_canonicals(
    events: &[NormalizedEvent],
    decisions: &[MatchDecision],
    config: &MatchingConfig,
) -> (Vec<EventCluster>, Vec<CanonicalDraft>) {
    let by_id: BTreeMap<&str, &NormalizedEvent> = events.iter().map(|e| (e.id(), e)).collect();

    let clusters = build_clusters(events, decisions, &config.cluster);
    let drafts =
        clusters.iter().map(|cluster| synthesize(cluster, &by_id, &config.canonical)).collect();

    (clusters, drafts)
}
