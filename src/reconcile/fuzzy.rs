//! Similarity scoring and greedy best-match assignment for headers.
//!
//! Scores use the Indel-based ratio on a 0–100 integer scale. Assignment is
//! greedy in source order: each source header takes its best remaining
//! template header, and a consumed template header is never offered again,
//! even to a later source header that would score higher against it. This is
//! not an optimal bipartite matching and must stay that way, since callers
//! observe which columns end up paired.

use rapidfuzz::fuzz;

/// Scores at or below this value never produce a match.
pub const MATCH_THRESHOLD: u8 = 75;

/// Symmetric similarity of two normalized headers on a 0–100 scale.
///
/// Empty input scores 0.
pub fn similarity(lhs: &str, rhs: &str) -> u8 {
    if lhs.is_empty() || rhs.is_empty() {
        return 0;
    }
    let ratio = fuzz::ratio(lhs.chars(), rhs.chars());
    (ratio * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}

/// A column pairing selected by score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredPair {
    pub source: u32,
    pub template: u32,
    pub score: u8,
}

/// Returns the best-scoring candidate. Ties keep the earliest candidate.
pub fn best_match<'a, I>(needle: &str, candidates: I) -> Option<(u32, u8)>
where
    I: IntoIterator<Item = (u32, &'a str)>,
{
    let mut best: Option<(u32, u8)> = None;
    for (column, candidate) in candidates {
        let score = similarity(needle, candidate);
        let best_score = best.map(|(_, score)| score).unwrap_or(0);
        if score > best_score {
            best = Some((column, score));
        }
    }
    best
}

/// Greedily pairs normalized source headers with normalized template headers.
///
/// Sources are visited in the given order. A pair is committed only when its
/// score is strictly greater than `threshold`.
pub fn assign_greedy(
    sources: &[(u32, String)],
    templates: &[(u32, String)],
    threshold: u8,
) -> Vec<ScoredPair> {
    let mut available: Vec<&(u32, String)> = templates.iter().collect();
    let mut pairs = Vec::new();

    for (source, normalized) in sources {
        let candidates = available
            .iter()
            .map(|(column, header)| (*column, header.as_str()));
        let Some((template, score)) = best_match(normalized, candidates) else {
            continue;
        };
        if score <= threshold {
            continue;
        }
        available.retain(|(column, _)| *column != template);
        pairs.push(ScoredPair {
            source: *source,
            template,
            score,
        });
    }

    pairs
}
