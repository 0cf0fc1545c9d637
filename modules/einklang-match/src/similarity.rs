//! Token-based string similarity over normalized text.

use strsim::normalized_levenshtein;

/// Edit ratio after sorting whitespace-separated tokens.
///
/// Robust against reordered title parts ("Umzug Fasnacht" vs
/// "Fasnacht Umzug"). Two empty strings are identical.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sa = sorted_tokens(a).join(" ");
    let sb = sorted_tokens(b).join(" ");
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    normalized_levenshtein(&sa, &sb)
}

/// Set-based ratio: compares the shared-token core against each side's
/// core-plus-remainder, taking the best of the three pairings. Forgiving
/// when one string embeds the other plus extra words.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = sorted_tokens(a);
    let tb = sorted_tokens(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let shared: Vec<&str> = ta.iter().filter(|t| tb.contains(t)).map(|s| *s).collect();
    let only_a: Vec<&str> = ta.iter().filter(|t| !tb.contains(t)).map(|s| *s).collect();
    let only_b: Vec<&str> = tb.iter().filter(|t| !ta.contains(t)).map(|s| *s).collect();

    let core = dedup_sorted(shared).join(" ");
    let core_a = join_parts(&core, &only_a.join(" "));
    let core_b = join_parts(&core, &only_b.join(" "));

    normalized_levenshtein(&core, &core_a)
        .max(normalized_levenshtein(&core, &core_b))
        .max(normalized_levenshtein(&core_a, &core_b))
}

/// Whether either string is a prefix of the other.
pub fn is_prefix_of_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

fn dedup_sorted(mut tokens: Vec<&str>) -> Vec<&str> {
    tokens.dedup();
    tokens
}

fn join_parts(core: &str, rest: &str) -> String {
    match (core.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => core.to_string(),
        _ => format!("{core} {rest}"),
    }
}
