//! AI arbitration of ambiguous pairs.
//!
//! Only deterministic-ambiguous decisions inside the configured inner band
//! reach the arbiter; the outer ambiguous band stays for human review.
//! Every resolution is pair-local: a failed call leaves its pair ambiguous
//! with tier `ai_unexpected` and the run continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use ai_client::{Claude, Usage};
use einklang_common::config::AiConfig;
use einklang_common::{Decision, DecisionTier, MatchDecision, PipelineError};
use einklang_match::NormalizedEvent;

// ---------------------------------------------------------------------------
// Arbiter contract
// ---------------------------------------------------------------------------

/// German-aware comparison guidance for the LLM.
const ARBITER_SYSTEM_PROMPT: &str = "\
Du vergleichst zwei Veranstaltungsdatensätze aus regionalen deutschen \
Printmedien und entscheidest, ob sie dasselbe reale Ereignis beschreiben. \
Beachte: Zeitungsartikel und Terminkalender beschreiben dasselbe Ereignis \
oft mit unterschiedlichen Titeln; Dialektbegriffe (Fasnet, Fasching, \
Fastnacht, Karneval) sind austauschbar; am selben Ort können am selben Tag \
mehrere verschiedene Veranstaltungen stattfinden, insbesondere bei stark \
abweichender Uhrzeit oder Zielgruppe. Die deterministischen Teil-Scores \
sind Hinweise, keine Vorgabe. Antworte ausschließlich über das Tool.";

/// What one event contributes to the arbitration request: the
/// matching-relevant fields only.
#[derive(Debug, Clone, Serialize)]
pub struct EventBrief {
    pub id: String,
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub source_type: String,
    pub dates: Vec<String>,
    pub categories: Vec<String>,
}

impl EventBrief {
    fn from_event(event: &NormalizedEvent) -> Self {
        let mut categories: Vec<String> = event.event.categories.clone();
        categories.sort();
        categories.dedup();
        Self {
            id: event.id().to_string(),
            title: event.title_norm.clone(),
            short_description: event.short_description_norm.clone(),
            description: event.description_norm.clone(),
            city: event.city_lower.clone(),
            venue: event.venue_norm.clone(),
            source_type: event.event.source_type.to_string(),
            dates: event.expanded_dates().iter().map(|d| d.to_string()).collect(),
            categories,
        }
    }

    /// The cache-relevant projection: every non-volatile field the arbiter
    /// sees. Source type is included because both the prompt guidance and
    /// the title blend depend on it.
    fn hash_view(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "short_description": self.short_description,
            "description": self.description,
            "city": self.city,
            "venue": self.venue,
            "source_type": self.source_type,
            "dates": self.dates,
            "categories": self.categories,
        })
    }
}

/// One ambiguous pair as presented to the arbiter, events in canonical
/// order, with the deterministic sub-scores.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrationRequest {
    pub event_a: EventBrief,
    pub event_b: EventBrief,
    pub date_score: f64,
    pub geo_score: f64,
    pub title_score: f64,
    pub description_score: f64,
    pub combined_score: f64,
}

impl ArbitrationRequest {
    pub fn new(a: &NormalizedEvent, b: &NormalizedEvent, decision: &MatchDecision) -> Self {
        // Canonical order regardless of argument order.
        let (first, second) = if a.id() <= b.id() { (a, b) } else { (b, a) };
        Self {
            event_a: EventBrief::from_event(first),
            event_b: EventBrief::from_event(second),
            date_score: decision.date_score,
            geo_score: decision.geo_score,
            title_score: decision.title_score,
            description_score: decision.description_score,
            combined_score: decision.combined_score,
        }
    }

    /// Order-independent content hash over the matching-relevant fields of
    /// both events. Volatile fields (ids, timestamps, scores) are excluded,
    /// so the same two events always hash identically.
    pub fn content_hash(&self) -> String {
        let views = [self.event_a.hash_view(), self.event_b.hash_view()];
        // Events are already canonically ordered by id, but ids are not part
        // of the hash; sort the serialized views so equal content on either
        // side cannot produce two hashes.
        let mut serialized: Vec<String> =
            views.iter().map(|v| serde_json::to_string(v).unwrap_or_default()).collect();
        serialized.sort();

        let mut hasher = Sha256::new();
        for view in &serialized {
            hasher.update(view.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Same,
    Different,
}

impl std::fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictKind::Same => write!(f, "same"),
            VerdictKind::Different => write!(f, "different"),
        }
    }
}

impl std::str::FromStr for VerdictKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "same" => Ok(Self::Same),
            "different" => Ok(Self::Different),
            other => Err(format!("unknown VerdictKind: {other}")),
        }
    }
}

/// The structured response the LLM must produce.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ArbiterVerdict {
    /// Whether the two records describe the same real-world event.
    pub decision: VerdictKind,
    /// Confidence in the decision, 0 to 1.
    pub confidence: f64,
    /// One or two sentences of justification.
    pub reasoning: String,
}

/// A verdict together with its token accounting.
#[derive(Debug, Clone)]
pub struct ArbiterOutcome {
    pub verdict: ArbiterVerdict,
    pub usage: Usage,
}

/// The LLM seam. Production uses [`ClaudeArbiter`]; tests script verdicts.
#[async_trait]
pub trait Arbiter: Send + Sync {
    fn model_id(&self) -> &str;
    async fn resolve(&self, request: &ArbitrationRequest) -> anyhow::Result<ArbiterOutcome>;
}

/// Arbiter backed by the Anthropic Messages API.
pub struct ClaudeArbiter {
    client: Claude,
}

impl ClaudeArbiter {
    pub fn new(api_key: &str, config: &AiConfig) -> Self {
        let client = Claude::new(api_key, &config.model)
            .with_temperature(config.temperature as f32)
            .with_max_output_tokens(config.max_output_tokens)
            .with_timeout(std::time::Duration::from_secs(config.request_timeout_secs));
        Self { client }
    }
}

#[async_trait]
impl Arbiter for ClaudeArbiter {
    fn model_id(&self) -> &str {
        self.client.model()
    }

    async fn resolve(&self, request: &ArbitrationRequest) -> anyhow::Result<ArbiterOutcome> {
        let user = serde_json::to_string_pretty(request)?;
        let extraction =
            self.client.extract::<ArbiterVerdict>(ARBITER_SYSTEM_PROMPT, user).await?;
        Ok(ArbiterOutcome { verdict: extraction.value, usage: extraction.usage })
    }
}

// ---------------------------------------------------------------------------
// Resolution store (cache + ledger seam)
// ---------------------------------------------------------------------------

/// A cached verdict, as the store returns it.
#[derive(Debug, Clone)]
pub struct CachedVerdict {
    pub decision: VerdictKind,
    pub confidence: f64,
    pub reasoning: String,
}

/// One ledger record for a resolution attempt.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub batch_id: Uuid,
    pub id_a: String,
    pub id_b: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost: f64,
    pub cache_hit: bool,
}

/// Persistence seam for the resolver: verdict cache and usage ledger.
#[async_trait]
pub trait ResolutionStore: Send + Sync {
    async fn cached_verdict(
        &self,
        content_hash: &str,
        model_id: &str,
    ) -> anyhow::Result<Option<CachedVerdict>>;
    async fn store_verdict(
        &self,
        content_hash: &str,
        verdict: &ArbiterVerdict,
        model_id: &str,
    ) -> anyhow::Result<()>;
    async fn append_usage(&self, record: UsageRecord) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct ResolverStats {
    pub eligible: u32,
    pub cache_hits: u32,
    pub resolved: u32,
    pub low_confidence: u32,
    pub failures: u32,
}

pub struct AiResolver {
    arbiter: Arc<dyn Arbiter>,
    store: Arc<dyn ResolutionStore>,
    config: AiConfig,
    batch_id: Uuid,
}

impl AiResolver {
    pub fn new(
        arbiter: Arc<dyn Arbiter>,
        store: Arc<dyn ResolutionStore>,
        config: AiConfig,
        batch_id: Uuid,
    ) -> Self {
        Self { arbiter, store, config, batch_id }
    }

    fn is_eligible(&self, decision: &MatchDecision) -> bool {
        decision.decision == Decision::Ambiguous
            && decision.tier == DecisionTier::Deterministic
            && decision.combined_score >= self.config.min_combined_score
            && decision.combined_score <= self.config.max_combined_score
    }

    /// Resolve every eligible pair. Calls run concurrently under the
    /// configured limit; results are written back by position, so the
    /// decision list stays in canonical pair order regardless of response
    /// arrival. Cancellation abandons in-flight calls and aborts the run;
    /// ledger rows already appended stay.
    pub async fn resolve_batch(
        &self,
        events: &[NormalizedEvent],
        mut decisions: Vec<MatchDecision>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<MatchDecision>, ResolverStats), PipelineError> {
        let by_id: BTreeMap<&str, &NormalizedEvent> =
            events.iter().map(|e| (e.id(), e)).collect();
        let mut stats = ResolverStats::default();

        // Cache pass first; only misses go to the LLM.
        let mut misses: Vec<(usize, String, ArbitrationRequest)> = Vec::new();
        for (index, decision) in decisions.iter_mut().enumerate() {
            if !self.is_eligible(decision) {
                continue;
            }
            stats.eligible += 1;
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let (Some(&a), Some(&b)) =
                (by_id.get(decision.id_a.as_str()), by_id.get(decision.id_b.as_str()))
            else {
                continue;
            };
            let request = ArbitrationRequest::new(a, b, decision);
            let hash = request.content_hash();

            if self.config.cache_enabled {
                match self.store.cached_verdict(&hash, self.arbiter.model_id()).await {
                    Ok(Some(cached)) => {
                        self.apply(decision, cached.decision, cached.confidence, cached.reasoning);
                        self.ledger(decision, Usage::default(), true).await;
                        stats.cache_hits += 1;
                        if decision.tier == DecisionTier::Ai {
                            stats.resolved += 1;
                        } else {
                            stats.low_confidence += 1;
                        }
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // A broken cache degrades to a fresh call.
                        warn!(error = %e, "AI cache lookup failed");
                    }
                }
            }
            misses.push((index, hash, request));
        }

        if misses.is_empty() {
            return Ok((decisions, stats));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));
        let mut in_flight = FuturesUnordered::new();
        for (index, hash, request) in misses {
            let arbiter = self.arbiter.clone();
            let semaphore = semaphore.clone();
            in_flight.push(async move {
                // Holding the permit across the call bounds concurrency.
                let _permit = semaphore.acquire_owned().await;
                let outcome = arbiter.resolve(&request).await;
                (index, hash, outcome)
            });
        }

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                next = in_flight.next() => next,
            };
            let Some((index, hash, outcome)) = next else { break };

            let decision = &mut decisions[index];
            match outcome {
                Ok(ArbiterOutcome { verdict, usage }) => {
                    if self.config.cache_enabled {
                        if let Err(e) =
                            self.store.store_verdict(&hash, &verdict, self.arbiter.model_id()).await
                        {
                            warn!(error = %e, "AI cache write failed");
                        }
                    }
                    self.apply(decision, verdict.decision, verdict.confidence, verdict.reasoning);
                    self.ledger(decision, usage, false).await;
                    if decision.tier == DecisionTier::Ai {
                        stats.resolved += 1;
                    } else {
                        stats.low_confidence += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        id_a = %decision.id_a,
                        id_b = %decision.id_b,
                        error = %e,
                        "AI resolution failed, pair stays ambiguous"
                    );
                    decision.tier = DecisionTier::AiUnexpected;
                    self.ledger(decision, Usage::default(), false).await;
                    stats.failures += 1;
                }
            }
        }

        Ok((decisions, stats))
    }

    /// Map a verdict onto the decision. Confident verdicts flip the pair to
    /// match/no-match (tier `ai`); anything below the threshold keeps it
    /// ambiguous (tier `ai_low_confidence`).
    fn apply(
        &self,
        decision: &mut MatchDecision,
        kind: VerdictKind,
        confidence: f64,
        reasoning: String,
    ) {
        decision.reasoning = Some(reasoning);
        if confidence >= self.config.confidence_threshold {
            decision.decision = match kind {
                VerdictKind::Same => Decision::Match,
                VerdictKind::Different => Decision::NoMatch,
            };
            decision.tier = DecisionTier::Ai;
        } else {
            decision.decision = Decision::Ambiguous;
            decision.tier = DecisionTier::AiLowConfidence;
        }
    }

    async fn ledger(&self, decision: &MatchDecision, usage: Usage, cache_hit: bool) {
        let estimated_cost = f64::from(usage.input_tokens) / 1_000_000.0
            * self.config.cost_per_mtok_input
            + f64::from(usage.output_tokens) / 1_000_000.0 * self.config.cost_per_mtok_output;
        let record = UsageRecord {
            batch_id: self.batch_id,
            id_a: decision.id_a.clone(),
            id_b: decision.id_b.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            estimated_cost,
            cache_hit,
        };
        if let Err(e) = self.store.append_usage(record).await {
            warn!(error = %e, "AI usage ledger append failed");
        }
    }
}
