/// Counters from one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PipelineResult {
    pub files_ingested: u32,
    /// Files whose events could not be loaded; handed to the dead-letter
    /// collaborator, the rest of the run continues without them.
    pub dead_letter_files: Vec<String>,
    pub events_loaded: u32,
    pub candidate_pairs: u32,
    pub reduction_pct: f64,
    pub matches: u32,
    pub ambiguous: u32,
    pub no_matches: u32,
    pub ai_eligible: u32,
    pub ai_cache_hits: u32,
    pub ai_resolved: u32,
    pub ai_low_confidence: u32,
    pub ai_failures: u32,
    pub canonicals: u32,
    pub flagged_clusters: u32,
}

impl std::fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Files ingested:    {}", self.files_ingested)?;
        if !self.dead_letter_files.is_empty() {
            writeln!(f, "Dead-lettered:     {}", self.dead_letter_files.join(", "))?;
        }
        writeln!(f, "Events loaded:     {}", self.events_loaded)?;
        writeln!(f, "Candidate pairs:   {} ({:.1}% reduction)", self.candidate_pairs, self.reduction_pct)?;
        writeln!(f, "Matches:           {}", self.matches)?;
        writeln!(f, "Ambiguous:         {}", self.ambiguous)?;
        writeln!(f, "No matches:        {}", self.no_matches)?;
        if self.ai_eligible > 0 {
            writeln!(f, "\nAI resolution:")?;
            writeln!(f, "  Eligible:        {}", self.ai_eligible)?;
            writeln!(f, "  Cache hits:      {}", self.ai_cache_hits)?;
            writeln!(f, "  Resolved:        {}", self.ai_resolved)?;
            writeln!(f, "  Low confidence:  {}", self.ai_low_confidence)?;
            writeln!(f, "  Failures:        {}", self.ai_failures)?;
        }
        writeln!(f, "\nCanonical events:  {}", self.canonicals)?;
        writeln!(f, "Flagged clusters:  {}", self.flagged_clusters)?;
        Ok(())
    }
}
