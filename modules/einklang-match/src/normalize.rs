//! Text normalization for matching.
//!
//! Normalized text never replaces the raw record; it lives alongside it in
//! [`NormalizedEvent`] for the duration of a run.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use unicode_normalization::UnicodeNormalization;

use einklang_common::config::NormalizerConfig;
use einklang_common::SourceEvent;

/// Deterministic, idempotent text normalizer.
///
/// Pipeline: Unicode NFC, casefold, trim, umlaut expansion, punctuation
/// strip (intra-word hyphens and spaces survive), whitespace collapse,
/// source-specific prefix strip, synonym folding. Prefix stripping runs
/// before synonym folding; configured prefixes may still contain the
/// dialect variants.
pub struct Normalizer {
    /// Per source-code, normalized prefixes sorted longest-first.
    prefixes: BTreeMap<String, Vec<String>>,
    synonyms: BTreeMap<String, String>,
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        let prefixes = config
            .prefixes
            .iter()
            .map(|(source, list)| {
                let mut normalized: Vec<String> =
                    list.iter().map(|p| base_normalize(p)).filter(|p| !p.is_empty()).collect();
                normalized.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
                normalized.dedup();
                (source.clone(), normalized)
            })
            .collect();

        Self { prefixes, synonyms: config.synonyms.clone() }
    }

    /// Normalize one raw string as extracted from the given source.
    pub fn normalize(&self, raw: &str, source_code: &str) -> String {
        let mut text = base_normalize(raw);

        if let Some(prefixes) = self.prefixes.get(source_code) {
            // Longest match wins; the list is pre-sorted.
            for prefix in prefixes {
                if let Some(rest) = text.strip_prefix(prefix.as_str()) {
                    text = rest.trim_start().to_string();
                    break;
                }
            }
        }

        text.split_whitespace()
            .map(|token| self.synonyms.get(token).map(String::as_str).unwrap_or(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The config-independent part of the pipeline: NFC, casefold, trim,
/// umlauts, punctuation, whitespace collapse.
fn base_normalize(raw: &str) -> String {
    let folded: String = raw.nfc().collect::<String>().to_lowercase();

    let mut expanded = String::with_capacity(folded.len() + 8);
    for c in folded.chars() {
        match c {
            'ä' => expanded.push_str("ae"),
            'ö' => expanded.push_str("oe"),
            'ü' => expanded.push_str("ue"),
            'ß' => expanded.push_str("ss"),
            _ => expanded.push(c),
        }
    }

    let chars: Vec<char> = expanded.chars().collect();
    let mut stripped = String::with_capacity(expanded.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c.is_whitespace() {
            stripped.push(c);
        } else if c == '-' {
            // Intra-word hyphens survive; dangling ones become separators.
            let intra_word = i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_alphanumeric()
                && chars[i + 1].is_alphanumeric();
            stripped.push(if intra_word { '-' } else { ' ' });
        } else {
            stripped.push(' ');
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// NormalizedEvent — a source event plus its per-run normalized views
// ---------------------------------------------------------------------------

/// A source event with the normalized text the scorers work on. The raw
/// record stays untouched.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event: SourceEvent,
    pub title_norm: String,
    pub short_description_norm: Option<String>,
    pub description_norm: Option<String>,
    /// Normalized venue name, for the geo scorer's venue check.
    pub venue_norm: Option<String>,
    /// Lowercased city, for blocking keys.
    pub city_lower: Option<String>,
}

impl NormalizedEvent {
    pub fn new(event: SourceEvent, normalizer: &Normalizer) -> Self {
        let source = event.source_code.clone();
        let norm = |s: &str| normalizer.normalize(s, &source);

        let title_norm = norm(&event.title);
        let short_description_norm =
            event.short_description.as_deref().map(norm).filter(|s| !s.is_empty());
        let description_norm = event.description.as_deref().map(norm).filter(|s| !s.is_empty());
        let venue_norm = event.location.name.as_deref().map(norm).filter(|s| !s.is_empty());
        let city_lower = event.location.city.as_deref().map(|c| c.trim().to_lowercase());

        Self { event, title_norm, short_description_norm, description_norm, venue_norm, city_lower }
    }

    pub fn id(&self) -> &str {
        &self.event.id
    }

    /// Normalized long description, falling back to the short one.
    pub fn best_description(&self) -> Option<&str> {
        self.description_norm.as_deref().or(self.short_description_norm.as_deref())
    }

    pub fn expanded_dates(&self) -> BTreeSet<NaiveDate> {
        self.event.expanded_dates()
    }

    /// Start time of the first date entry (in listing order) covering `date`.
    pub fn start_time_on(&self, date: NaiveDate) -> Option<NaiveTime> {
        self.event.dates.iter().find(|d| d.covers(date) && d.start_time.is_some())?.start_time
    }
}
