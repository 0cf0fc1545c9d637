//! The pipeline driver: one `process_batch` call per arrival of new
//! publication files.
//!
//! The driver is the only place where storage, the pure matching core, and
//! the AI resolver meet. It owns the in-run event and cluster structures;
//! nothing outside ever sees them. Writes happen exactly twice: ledger
//! appends during resolution and the single clear-and-replace transaction
//! at the end.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use einklang_common::{
    AppConfig, CredentialSealer, Decision, MatchDecision, MatchingConfig, PipelineError,
    SourceEvent,
};
use einklang_match::{
    assemble_canonicals, normalize_events, score_candidates, NormalizedEvent,
};
use einklang_store::{config_store, models::source_event};

use crate::pg_store::PgResolutionStore;
use crate::resolver::{AiResolver, Arbiter, ClaudeArbiter, ResolverStats};
use crate::stats::PipelineResult;

pub struct PipelineDriver {
    pool: PgPool,
    app: AppConfig,
    /// Test seam; production builds a [`ClaudeArbiter`] per run.
    arbiter_override: Option<Arc<dyn Arbiter>>,
}

impl PipelineDriver {
    pub fn new(pool: PgPool, app: AppConfig) -> Self {
        Self { pool, app, arbiter_override: None }
    }

    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter_override = Some(arbiter);
        self
    }

    /// Run the full pipeline over the event store, triggered by a batch of
    /// newly written file ids. On any fatal error the previous canonical
    /// state is left intact.
    pub async fn process_batch(
        &self,
        file_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        match self.run(file_ids, cancel).await {
            Ok(result) => {
                info!(
                    events = result.events_loaded,
                    canonicals = result.canonicals,
                    flagged = result.flagged_clusters,
                    "pipeline_complete"
                );
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, "pipeline_failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        file_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        // Config is loaded once per run and immutable from here on.
        let config =
            config_store::load_matching_config(&self.pool, self.app.config_path.as_deref()).await?;

        let mut result = PipelineResult::default();

        // Batch files load individually: a broken file is dead-lettered and
        // must not abort the others. An empty batch re-runs the whole store
        // (e.g. after a config change).
        let mut events: Vec<SourceEvent> = Vec::new();
        for file_id in file_ids {
            match source_event::load_by_file(file_id, &self.pool).await {
                Ok(file_events) => {
                    info!(file = %file_id, events = file_events.len(), "file_ingested");
                    result.files_ingested += 1;
                    events.extend(file_events);
                }
                Err(e) => {
                    warn!(file = %file_id, error = %e, "file load failed, dead-lettering");
                    result.dead_letter_files.push(file_id.clone());
                }
            }
        }

        // Full re-clustering needs the rest of the store too.
        if file_ids.is_empty() {
            events = source_event::load_all(&self.pool).await?;
        } else {
            events.extend(source_event::load_excluding_files(file_ids, &self.pool).await?);
        }
        result.events_loaded = events.len() as u32;
        info!(events = events.len(), "events_loaded");

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let normalized = normalize_events(events, &config);
        let (candidates, mut decisions) = score_candidates(&normalized, &config);
        result.candidate_pairs = candidates.pairs.len() as u32;
        result.reduction_pct = candidates.reduction_pct;

        if config.ai.enabled {
            let resolver_stats =
                self.resolve_ambiguous(&normalized, &mut decisions, &config, cancel).await?;
            result.ai_eligible = resolver_stats.eligible;
            result.ai_cache_hits = resolver_stats.cache_hits;
            result.ai_resolved = resolver_stats.resolved;
            result.ai_low_confidence = resolver_stats.low_confidence;
            result.ai_failures = resolver_stats.failures;
        }

        for decision in &decisions {
            match decision.decision {
                Decision::Match => result.matches += 1,
                Decision::Ambiguous => result.ambiguous += 1,
                Decision::NoMatch => result.no_matches += 1,
            }
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let (clusters, drafts) = assemble_canonicals(&normalized, &decisions, &config);
        result.canonicals = drafts.len() as u32;
        result.flagged_clusters = clusters.iter().filter(|c| c.needs_review).count() as u32;

        info!(
            matches = result.matches,
            ambiguous = result.ambiguous,
            no_matches = result.no_matches,
            canonicals = result.canonicals,
            flagged = result.flagged_clusters,
            candidate_reduction_pct = result.reduction_pct,
            "matching_complete"
        );

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        einklang_store::replace_run_output(&drafts, &decisions, &self.pool).await?;

        Ok(result)
    }

    /// Hand the inner ambiguous band to the AI resolver. A missing
    /// credential degrades to no resolution instead of failing the run.
    async fn resolve_ambiguous(
        &self,
        normalized: &[NormalizedEvent],
        decisions: &mut Vec<MatchDecision>,
        config: &MatchingConfig,
        cancel: &CancellationToken,
    ) -> Result<ResolverStats, PipelineError> {
        let arbiter: Arc<dyn Arbiter> = match &self.arbiter_override {
            Some(arbiter) => arbiter.clone(),
            None => match self.load_llm_credential().await? {
                Some(api_key) => Arc::new(ClaudeArbiter::new(&api_key, &config.ai)),
                None => {
                    warn!("ai.enabled is set but no LLM credential is available, skipping AI resolution");
                    return Ok(ResolverStats::default());
                }
            },
        };

        let resolver = AiResolver::new(
            arbiter,
            Arc::new(PgResolutionStore::new(self.pool.clone())),
            config.ai.clone(),
            Uuid::new_v4(),
        );
        let (resolved, stats) =
            resolver.resolve_batch(normalized, std::mem::take(decisions), cancel).await?;
        *decisions = resolved;
        Ok(stats)
    }

    /// The sealed credential from the config store wins; the plain env var
    /// is the fallback for development setups.
    async fn load_llm_credential(&self) -> Result<Option<String>, PipelineError> {
        if let Some(key_b64) = &self.app.credential_key {
            let sealer = CredentialSealer::from_base64_key(key_b64)
                .map_err(|e| PipelineError::ConfigLoad(e.to_string()))?;
            if let Some(credential) = config_store::load_credential(&sealer, &self.pool).await? {
                return Ok(Some(credential));
            }
        }
        Ok(self.app.anthropic_api_key.clone())
    }
}
