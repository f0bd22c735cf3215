//! Candidate scoring and best-match resolution.
//!
//! Scores are on a 0-100 scale. Every measure gives 100 for identical text
//! and 0 when the two strings share no character. Under the partial measures
//! equal scores are separated by the full ratio, so a candidate that merely
//! contains the query loses to one equal to it. Remaining ties resolve to the
//! candidate that appears first in the reference table.
//!
//! Two engines sit behind [`MatchEngine`] and always agree:
//! [`ScanEngine`] scores every candidate from scratch, [`PrunedEngine`] uses the
//! index's precomputed token-sorted forms and skips candidates whose length
//! alone rules them out.

use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::index::ReferenceIndex;
use crate::model::{Candidate, MatchResult, ScoredCandidate};

/// Queries longer than this (in chars) are scored with the full token-sort
/// ratio under [`Measure::Adaptive`]; shorter ones with the partial ratio.
///
/// The length is that of the normalized, token-sorted query, not of the raw
/// detail cell. Normalization has already removed punctuation by then, so a
/// comma in a short raw detail does not force the full ratio either.
pub const LONG_QUERY_CHARS: usize = 20;

// ---------------------------------------------------------------------------
// Threshold
// ---------------------------------------------------------------------------

/// Minimum score for a match, validated to lie in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, LinkError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LinkError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Normalized Levenshtein ratio over token-sorted text.
    #[default]
    TokenSort,
    /// Best equal-length window of the longer token-sorted text.
    PartialTokenSort,
    /// `TokenSort` for long queries, `PartialTokenSort` for short ones.
    Adaptive,
    /// 100 on identical normalized text, 0 otherwise.
    Exact,
}

impl Measure {
    /// Whether the score is bounded by `min_len / max_len`, which lets the
    /// pruned engine skip candidates by length alone.
    fn length_bounded(self, query_len: usize) -> bool {
        match self {
            Self::TokenSort => true,
            Self::Adaptive => query_len > LONG_QUERY_CHARS,
            Self::PartialTokenSort | Self::Exact => false,
        }
    }

    fn score(self, query: &str, query_sorted: &str, query_len: usize, candidate: &str, candidate_sorted: &str) -> f64 {
        match self {
            Self::TokenSort => ratio(query_sorted, candidate_sorted),
            Self::PartialTokenSort => partial_ratio(query_sorted, candidate_sorted),
            Self::Adaptive => {
                if query_len > LONG_QUERY_CHARS {
                    ratio(query_sorted, candidate_sorted)
                } else {
                    partial_ratio(query_sorted, candidate_sorted)
                }
            }
            Self::Exact => {
                if query == candidate {
                    100.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Whether equal scores need the full ratio to tell candidates apart.
    /// A partial score of 100 only says one text contains the other.
    fn partial(self, query_len: usize) -> bool {
        match self {
            Self::PartialTokenSort => true,
            Self::Adaptive => query_len <= LONG_QUERY_CHARS,
            Self::TokenSort | Self::Exact => false,
        }
    }

    /// `(score, tie_break)`, compared lexicographically. Only the partial
    /// measures carry a tie-break distinct from the score.
    fn score_key(
        self,
        query: &str,
        query_sorted: &str,
        query_len: usize,
        candidate: &str,
        candidate_sorted: &str,
    ) -> (f64, f64) {
        let score = self.score(query, query_sorted, query_len, candidate, candidate_sorted);
        if self.partial(query_len) {
            (score, ratio(query_sorted, candidate_sorted))
        } else {
            (score, score)
        }
    }
}

/// Strictly better: higher score, or equal score and higher tie-break.
fn beats(key: (f64, f64), best: Option<(usize, (f64, f64))>) -> bool {
    match best {
        None => true,
        Some((_, (score, tie))) => key.0 > score || (key.0 == score && key.1 > tie),
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenSort => write!(f, "token_sort"),
            Self::PartialTokenSort => write!(f, "partial_token_sort"),
            Self::Adaptive => write!(f, "adaptive"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// Sort whitespace-separated tokens so word order stops mattering.
pub fn sort_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// `100 * (1 - levenshtein / max_len)`, counted in chars.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best [`ratio`] between the shorter string and any equal-length window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let short_str: String = short.iter().collect();
    let width = short.len();
    let mut best = 0.0f64;
    for start in 0..=(long.len() - width) {
        let window: String = long[start..start + width].iter().collect();
        let score = ratio(&short_str, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Upper bound of [`ratio`] for strings of these char lengths. Computed with
/// the same float steps as `ratio`, so `ratio(a, b) <= length_bound(..)` holds
/// exactly, not just mathematically.
fn length_bound(a_len: usize, b_len: usize) -> f64 {
    let max = a_len.max(b_len);
    if max == 0 {
        return 100.0;
    }
    let min_distance = a_len.abs_diff(b_len);
    (1.0 - min_distance as f64 / max as f64) * 100.0
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Scan,
    #[default]
    Pruned,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Pruned => write!(f, "pruned"),
        }
    }
}

pub trait MatchEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn measure(&self) -> Measure;

    /// Best candidate for an already-normalized query.
    fn best_match(&self, query: &str, index: &ReferenceIndex, threshold: Threshold) -> MatchResult;
}

pub fn build_engine(kind: EngineKind, measure: Measure) -> Box<dyn MatchEngine> {
    match kind {
        EngineKind::Scan => Box::new(ScanEngine { measure }),
        EngineKind::Pruned => Box::new(PrunedEngine { measure }),
    }
}

/// Reference implementation: token-sorts and scores every candidate per query.
#[derive(Debug, Clone, Copy)]
pub struct ScanEngine {
    pub measure: Measure,
}

impl MatchEngine for ScanEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Scan
    }

    fn measure(&self) -> Measure {
        self.measure
    }

    fn best_match(&self, query: &str, index: &ReferenceIndex, threshold: Threshold) -> MatchResult {
        if query.trim().is_empty() {
            return MatchResult::empty();
        }
        let query_sorted = sort_tokens(query);
        let query_len = query_sorted.chars().count();

        let mut best: Option<(usize, (f64, f64))> = None;
        for (id, normalized) in index.all() {
            let candidate_sorted = sort_tokens(normalized);
            let key = self
                .measure
                .score_key(query, &query_sorted, query_len, normalized, &candidate_sorted);
            if beats(key, best) {
                best = Some((id, key));
            }
        }
        resolve(best, threshold)
    }
}

/// Optimized implementation over the index's precomputed forms.
#[derive(Debug, Clone, Copy)]
pub struct PrunedEngine {
    pub measure: Measure,
}

impl MatchEngine for PrunedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Pruned
    }

    fn measure(&self) -> Measure {
        self.measure
    }

    fn best_match(&self, query: &str, index: &ReferenceIndex, threshold: Threshold) -> MatchResult {
        if query.trim().is_empty() {
            return MatchResult::empty();
        }
        let query_sorted = sort_tokens(query);
        let query_len = query_sorted.chars().count();
        let bounded = self.measure.length_bounded(query_len);

        let mut best: Option<(usize, (f64, f64))> = None;
        for candidate in index.candidates() {
            if let Some((_, (best_score, _))) = best {
                // Bounded measures have no separate tie-break, so a later
                // candidate can only win with a strictly higher score.
                if bounded && length_bound(query_len, candidate.sorted_len) <= best_score {
                    continue;
                }
            }
            let key = score_candidate(self.measure, query, &query_sorted, query_len, candidate);
            if beats(key, best) {
                best = Some((candidate.id, key));
                if key.0 >= 100.0 && key.1 >= 100.0 {
                    break;
                }
            }
        }
        resolve(best, threshold)
    }
}

fn score_candidate(
    measure: Measure,
    query: &str,
    query_sorted: &str,
    query_len: usize,
    candidate: &Candidate,
) -> (f64, f64) {
    measure.score_key(query, query_sorted, query_len, &candidate.normalized, &candidate.sorted)
}

fn resolve(best: Option<(usize, (f64, f64))>, threshold: Threshold) -> MatchResult {
    match best {
        Some((id, (score, _))) if score >= threshold.value() => MatchResult {
            candidate: Some(id),
            nearest: Some(id),
            score,
            matched: true,
        },
        Some((id, (score, _))) => MatchResult {
            candidate: None,
            nearest: Some(id),
            score,
            matched: false,
        },
        None => MatchResult::empty(),
    }
}

/// Top `limit` candidates for a normalized query, best first. Equal scores
/// are ordered the way [`MatchEngine::best_match`] breaks ties.
pub fn rank(query: &str, index: &ReferenceIndex, measure: Measure, limit: usize) -> Vec<ScoredCandidate> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let query_sorted = sort_tokens(query);
    let query_len = query_sorted.chars().count();

    let mut keyed: Vec<((f64, f64), &Candidate)> = index
        .candidates()
        .iter()
        .map(|c| (score_candidate(measure, query, &query_sorted, query_len, c), c))
        .collect();
    keyed.sort_by(|(a, ca), (b, cb)| {
        b.0.total_cmp(&a.0)
            .then(b.1.total_cmp(&a.1))
            .then(ca.id.cmp(&cb.id))
    });
    keyed
        .into_iter()
        .take(limit)
        .map(|((score, _), c)| ScoredCandidate {
            id: c.id,
            description: c.raw.clone(),
            score,
        })
        .collect()
}
