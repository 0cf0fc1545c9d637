use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance sentinel for canonical fields built from every linked source.
pub const UNION_ALL_SOURCES: &str = "union_all_sources";

// --- Source events (immutable after ingestion) ---

/// Which kind of publication section an event record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Editorial article.
    Artikel,
    /// Calendar listing.
    Terminliste,
    /// Paid announcement.
    Anzeige,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Artikel => write!(f, "artikel"),
            SourceType::Terminliste => write!(f, "terminliste"),
            SourceType::Anzeige => write!(f, "anzeige"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "artikel" => Ok(Self::Artikel),
            "terminliste" => Ok(Self::Terminliste),
            "anzeige" => Ok(Self::Anzeige),
            other => Err(format!("unknown SourceType: {other}")),
        }
    }
}

/// Geographic point with the geocoder's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Geocoding confidence in [0, 1].
    pub confidence: f64,
}

/// Structured location as printed in the source publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Venue name ("Stadthalle", "Festhalle Waldkirch").
    pub name: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub street: Option<String>,
    pub zipcode: Option<String>,
}

impl Location {
    /// Number of populated fields, used by the most-complete-location strategy.
    pub fn completeness(&self) -> usize {
        [&self.name, &self.city, &self.district, &self.street, &self.zipcode]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }
}

/// One scheduled occurrence. `end_date` makes the entry an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDate {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
}

impl EventDate {
    pub fn on(date: NaiveDate) -> Self {
        Self { date, start_time: None, end_time: None, end_date: None }
    }

    /// All concrete dates this entry covers (range inclusive).
    /// An `end_date` before `date` yields just `date`.
    pub fn expand(&self) -> Vec<NaiveDate> {
        let end = self.end_date.filter(|e| *e >= self.date).unwrap_or(self.date);
        let mut out = Vec::new();
        let mut d = self.date;
        while d <= end {
            out.push(d);
            d = match d.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        out
    }

    /// Whether this entry covers the given concrete date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let end = self.end_date.filter(|e| *e >= self.date).unwrap_or(self.date);
        self.date <= date && date <= end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFlags {
    pub is_family: bool,
    pub is_child_focused: bool,
    pub admission_free: bool,
}

impl EventFlags {
    pub fn or(self, other: Self) -> Self {
        Self {
            is_family: self.is_family || other.is_family,
            is_child_focused: self.is_child_focused || other.is_child_focused,
            admission_free: self.admission_free || other.admission_free,
        }
    }
}

/// An event record as extracted from one publication file.
///
/// Written once by the ingestion collaborator; the matching core only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Externally assigned, globally unique.
    pub id: String,
    /// Identifier of the publication file this record came from.
    pub file_id: String,
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub highlights: Vec<String>,
    pub location: Location,
    pub geo: Option<GeoPoint>,
    /// Publisher tag ("bz", "azw", ...).
    pub source_code: String,
    pub source_type: SourceType,
    pub categories: Vec<String>,
    pub flags: EventFlags,
    /// Non-empty by the ingestion contract.
    pub dates: Vec<EventDate>,
    pub ingested_at: DateTime<Utc>,
}

impl SourceEvent {
    /// The set of concrete dates across all entries, ranges expanded.
    pub fn expanded_dates(&self) -> BTreeSet<NaiveDate> {
        self.dates.iter().flat_map(|d| d.expand()).collect()
    }

    /// Online events carry neither a city nor coordinates and are
    /// unreachable through blocking.
    pub fn is_online(&self) -> bool {
        self.location.city.is_none() && self.geo.is_none()
    }
}

// --- Match decisions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Match,
    Ambiguous,
    NoMatch,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Match => write!(f, "match"),
            Decision::Ambiguous => write!(f, "ambiguous"),
            Decision::NoMatch => write!(f, "no_match"),
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "match" => Ok(Self::Match),
            "ambiguous" => Ok(Self::Ambiguous),
            "no_match" => Ok(Self::NoMatch),
            other => Err(format!("unknown Decision: {other}")),
        }
    }
}

/// Which layer produced the final decision for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    Deterministic,
    Ai,
    AiLowConfidence,
    AiUnexpected,
}

impl std::fmt::Display for DecisionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionTier::Deterministic => write!(f, "deterministic"),
            DecisionTier::Ai => write!(f, "ai"),
            DecisionTier::AiLowConfidence => write!(f, "ai_low_confidence"),
            DecisionTier::AiUnexpected => write!(f, "ai_unexpected"),
        }
    }
}

impl std::str::FromStr for DecisionTier {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deterministic" => Ok(Self::Deterministic),
            "ai" => Ok(Self::Ai),
            "ai_low_confidence" => Ok(Self::AiLowConfidence),
            "ai_unexpected" => Ok(Self::AiUnexpected),
            other => Err(format!("unknown DecisionTier: {other}")),
        }
    }
}

/// Audit record for one evaluated candidate pair. `id_a < id_b` always.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
    pub id_a: String,
    pub id_b: String,
    pub date_score: f64,
    pub geo_score: f64,
    pub title_score: f64,
    pub description_score: f64,
    pub combined_score: f64,
    pub decision: Decision,
    pub tier: DecisionTier,
    /// AI reasoning, present only on AI-touched tiers.
    pub reasoning: Option<String>,
}

impl MatchDecision {
    pub fn is_match(&self) -> bool {
        self.decision == Decision::Match
    }
}

/// Canonical pair ordering: `(min, max)` by string comparison.
pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

// --- Canonical events ---

/// A synthesized canonical event before the store assigns its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalDraft {
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub highlights: Vec<String>,
    pub location: Location,
    pub geo: Option<GeoPoint>,
    pub categories: Vec<String>,
    pub flags: EventFlags,
    pub dates: Vec<EventDate>,
    /// Cluster members, sorted by id. Never empty.
    pub source_ids: Vec<String>,
    pub source_count: u32,
    /// Mean intra-cluster match-edge weight; 1.0 for singletons.
    pub match_confidence: f64,
    pub needs_review: bool,
    pub ai_assisted: bool,
    /// Field name -> contributing source id, or [`UNION_ALL_SOURCES`].
    pub field_provenance: BTreeMap<String, String>,
}

/// A persisted canonical event (one row per real-world event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: i64,
    pub title: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub highlights: Vec<String>,
    pub location: Location,
    pub geo: Option<GeoPoint>,
    pub categories: Vec<String>,
    pub flags: EventFlags,
    pub dates: Vec<EventDate>,
    pub source_count: u32,
    pub match_confidence: f64,
    pub needs_review: bool,
    pub ai_assisted: bool,
    pub field_provenance: BTreeMap<String, String>,
    pub version: i32,
}
