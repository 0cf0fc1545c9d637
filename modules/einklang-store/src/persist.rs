//! The clear-and-replace transaction.
//!
//! One pipeline run replaces the entire canonical layer atomically: readers
//! see either the previous run in full or the new one in full. Source
//! events, the AI cache and the usage ledger are never touched here.

use sqlx::PgPool;
use tracing::info;

use einklang_common::{CanonicalDraft, MatchDecision, PipelineError};

use crate::models::{canonical, decision};

/// Row counts written by the replace transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplaceOutcome {
    pub canonicals: u32,
    pub links: u32,
    pub decisions: u32,
}

/// Atomically replace canonicals, links, and decisions with this run's
/// output. Deletes run child-first (decisions, links, then canonicals) so
/// the foreign keys hold without relying on cascades.
pub async fn replace_run_output(
    drafts: &[CanonicalDraft],
    decisions: &[MatchDecision],
    pool: &PgPool,
) -> Result<ReplaceOutcome, PipelineError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

    let persist = async {
        sqlx::query("DELETE FROM match_decisions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM canonical_event_sources").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM canonical_events").execute(&mut *tx).await?;

        let mut outcome = ReplaceOutcome::default();
        for draft in drafts {
            let canonical_id = canonical::insert_draft(draft, &mut tx).await?;
            outcome.canonicals += 1;
            for source_id in &draft.source_ids {
                canonical::insert_link(canonical_id, source_id, &mut tx).await?;
                outcome.links += 1;
            }
        }
        for d in decisions {
            decision::insert_decision(d, &mut tx).await?;
            outcome.decisions += 1;
        }
        Ok::<_, sqlx::Error>(outcome)
    };

    let outcome = match persist.await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Dropping the transaction rolls it back; previous state is intact.
            return Err(PipelineError::Persistence(e.to_string()));
        }
    };

    tx.commit().await.map_err(|e| PipelineError::Persistence(e.to_string()))?;

    info!(
        canonicals = outcome.canonicals,
        links = outcome.links,
        decisions = outcome.decisions,
        "canonical store replaced"
    );
    Ok(outcome)
}
