use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::SourceType;

// ---------------------------------------------------------------------------
// MatchingConfig — versioned per-run configuration (TOML payload)
// ---------------------------------------------------------------------------

/// Immutable matching configuration, loaded once at the start of every
/// pipeline run from the configuration store (TOML file fallback) and passed
/// by reference through the pipeline. Every group carries the documented
/// defaults, so a partial TOML document is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub scoring: ScoringWeights,
    pub thresholds: ThresholdConfig,
    pub geo: GeoConfig,
    pub date: DateConfig,
    pub title: TitleConfig,
    pub cluster: ClusterConfig,
    pub category_weights: CategoryWeightsConfig,
    pub canonical: CanonicalConfig,
    pub normalizer: NormalizerConfig,
    pub ai: AiConfig,
}

impl MatchingConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("failed to parse matching config TOML")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize matching config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// Per-signal weights for the combined score. Must describe all four signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub date: f64,
    pub geo: f64,
    pub title: f64,
    pub description: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { date: 0.30, geo: 0.25, title: 0.30, description: 0.15 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Combined score at or above which a pair is a match.
    pub high: f64,
    /// Combined score at or below which a pair is a no-match.
    pub low: f64,
    /// Title score below which a pair can never be a match, only ambiguous.
    pub title_veto: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { high: 0.75, low: 0.35, title_veto: 0.45 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeoConfig {
    /// Distance at which the geo score reaches zero.
    pub max_distance_km: f64,
    /// Minimum geocoding confidence on both sides; below it the signal is neutral.
    pub min_confidence: f64,
    /// Score when coordinates are missing or untrusted.
    pub neutral_score: f64,
    /// Within this distance the venue-name check applies.
    pub venue_match_distance_km: f64,
    /// Venue-name similarity below which the mismatch factor kicks in.
    pub venue_similarity_threshold: f64,
    /// Multiplier applied on a venue-name mismatch.
    pub venue_mismatch_factor: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            max_distance_km: 10.0,
            min_confidence: 0.85,
            neutral_score: 0.5,
            venue_match_distance_km: 1.0,
            venue_similarity_threshold: 0.50,
            venue_mismatch_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateConfig {
    /// Start-time gap up to which events count as simultaneous.
    pub time_tolerance_minutes: i64,
    /// Start-time gap up to which `close_factor` applies.
    pub time_close_minutes: i64,
    pub close_factor: f64,
    pub far_factor: f64,
    /// Beyond this many hours of start-time gap, `time_gap_penalty_factor` applies.
    pub time_gap_penalty_hours: i64,
    pub time_gap_penalty_factor: f64,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            time_tolerance_minutes: 30,
            time_close_minutes: 90,
            close_factor: 0.7,
            far_factor: 0.3,
            time_gap_penalty_hours: 2,
            time_gap_penalty_factor: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TitleConfig {
    /// Weight of the token-sort ratio inside the blend band.
    pub primary_weight: f64,
    /// Weight of the token-set ratio inside the blend band.
    pub secondary_weight: f64,
    pub blend_lower: f64,
    pub blend_upper: f64,
    /// Blend weights when the two events have different source types;
    /// journalistic headlines and calendar listings diverge lexically.
    pub cross_primary_weight: f64,
    pub cross_secondary_weight: f64,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            primary_weight: 0.7,
            secondary_weight: 0.3,
            blend_lower: 0.40,
            blend_upper: 0.80,
            cross_primary_weight: 0.4,
            cross_secondary_weight: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub max_cluster_size: usize,
    /// Mean intra-cluster match-edge weight below which a cluster is flagged.
    pub min_internal_similarity: f64,
    /// Maximum distinct concrete dates across cluster members.
    pub max_date_spread: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { max_cluster_size: 15, min_internal_similarity: 0.40, max_date_spread: 3 }
    }
}

/// Category-specific weight overrides. When both events share a category,
/// the first shared one in `priority` order replaces the global weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryWeightsConfig {
    pub priority: Vec<String>,
    pub overrides: BTreeMap<String, ScoringWeights>,
}

impl Default for CategoryWeightsConfig {
    fn default() -> Self {
        // Carnival events share venues and dates across a whole town, so the
        // title matters less and geography more; assemblies are the inverse.
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "fasnacht".to_string(),
            ScoringWeights { date: 0.30, geo: 0.35, title: 0.20, description: 0.15 },
        );
        overrides.insert(
            "versammlung".to_string(),
            ScoringWeights { date: 0.25, geo: 0.20, title: 0.40, description: 0.15 },
        );
        Self { priority: vec!["fasnacht".to_string(), "versammlung".to_string()], overrides }
    }
}

/// Per-field synthesis strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStrategy {
    /// Longest value with at least 10 characters, else longest overall.
    LongestMin10,
    /// Longest value overall.
    Longest,
    /// Longest non-empty value.
    LongestNonEmpty,
    /// From the source with the most populated location fields.
    MostCompleteLocation,
    /// Most frequent value; source-type preference breaks ties.
    ModeCity,
    /// From the source with the highest geocoding confidence.
    HighestConfidence,
    /// Union across all sources.
    Union,
    /// Boolean OR across all sources.
    LogicalOr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanonicalConfig {
    /// Tie-break order for the city mode (most trusted first).
    pub source_type_preference: Vec<SourceType>,
    /// Strategy per canonical field; unknown fields are ignored and missing
    /// fields use the documented default.
    pub field_strategies: BTreeMap<String, FieldStrategy>,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        let mut field_strategies = BTreeMap::new();
        field_strategies.insert("title".to_string(), FieldStrategy::LongestMin10);
        field_strategies.insert("short_description".to_string(), FieldStrategy::LongestNonEmpty);
        field_strategies.insert("description".to_string(), FieldStrategy::LongestNonEmpty);
        field_strategies.insert("highlights".to_string(), FieldStrategy::Union);
        field_strategies.insert("location".to_string(), FieldStrategy::MostCompleteLocation);
        field_strategies.insert("location_city".to_string(), FieldStrategy::ModeCity);
        field_strategies.insert("geo".to_string(), FieldStrategy::HighestConfidence);
        field_strategies.insert("dates".to_string(), FieldStrategy::Union);
        field_strategies.insert("categories".to_string(), FieldStrategy::Union);
        field_strategies.insert("flags".to_string(), FieldStrategy::LogicalOr);
        Self {
            source_type_preference: vec![
                SourceType::Terminliste,
                SourceType::Artikel,
                SourceType::Anzeige,
            ],
            field_strategies,
        }
    }
}

/// Text normalization maps: per-source literal prefixes to strip and German
/// dialect synonyms to fold onto one canonical token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// source_code -> literal prefixes; the longest matching prefix wins.
    pub prefixes: BTreeMap<String, Vec<String>>,
    /// variant token -> canonical token.
    pub synonyms: BTreeMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let mut synonyms = BTreeMap::new();
        for variant in ["fasnet", "fasching", "fastnacht", "karneval"] {
            synonyms.insert(variant.to_string(), "fasnacht".to_string());
        }
        Self { prefixes: BTreeMap::new(), synonyms }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub max_concurrent_requests: usize,
    /// Verdicts below this confidence keep the pair ambiguous.
    pub confidence_threshold: f64,
    /// Inner band of deterministic-ambiguous combined scores handed to the AI.
    pub min_combined_score: f64,
    pub max_combined_score: f64,
    pub cache_enabled: bool,
    pub request_timeout_secs: u64,
    /// Prices per million tokens, for the usage ledger's cost estimate.
    pub cost_per_mtok_input: f64,
    pub cost_per_mtok_output: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "claude-haiku-4-5-20251001".to_string(),
            temperature: 0.0,
            max_output_tokens: 1024,
            max_concurrent_requests: 5,
            confidence_threshold: 0.6,
            min_combined_score: 0.65,
            max_combined_score: 0.79,
            cache_enabled: true,
            request_timeout_secs: 30,
            cost_per_mtok_input: 1.0,
            cost_per_mtok_output: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig — secrets and env-specific values
// ---------------------------------------------------------------------------

/// Environment-sourced configuration. Only secrets and deployment paths live
/// here; everything tunable is in the TOML `MatchingConfig`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Direct API key, used when the configuration store holds no sealed
    /// credential.
    pub anthropic_api_key: Option<String>,
    /// Base64 32-byte key that opens the sealed LLM credential.
    pub credential_key: Option<String>,
    /// Fallback matching-config TOML, used when the store has no config row.
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            credential_key: std::env::var("EINKLANG_CREDENTIAL_KEY").ok(),
            config_path: std::env::var("EINKLANG_CONFIG_PATH").ok().map(PathBuf::from),
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => format!("({} chars)", v.len()),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: ({} chars)", self.database_url.len());
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview_opt(&self.anthropic_api_key));
        tracing::info!("  EINKLANG_CREDENTIAL_KEY: {}", preview_opt(&self.credential_key));
        if let Some(path) = &self.config_path {
            tracing::info!("  EINKLANG_CONFIG_PATH: {}", path.display());
        }
    }
}
