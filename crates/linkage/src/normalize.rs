//! Text canonicalization applied to both record details and reference
//! descriptions before scoring.
//!
//! [`normalize_text`] is the pure function; [`Normalizer`] wraps it with a
//! content-addressed cache owned by the instance, so a run that sees the same
//! raw detail on thousands of rows only folds it once. The cache never changes
//! output and can be cleared at any point.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizationRules {
    /// Decompose (NFD) and drop combining marks: "Transferência" -> "transferencia".
    pub strip_diacritics: bool,
    /// Characters replaced by a space. `None` treats every non-alphanumeric
    /// character as noise.
    pub strip_chars: Option<String>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self {
            strip_diacritics: true,
            strip_chars: None,
        }
    }
}

impl NormalizationRules {
    fn is_noise(&self, c: char) -> bool {
        match &self.strip_chars {
            Some(set) => set.contains(c),
            None => !c.is_alphanumeric() && !is_combining_mark(c),
        }
    }
}

/// Lower-case, fold diacritics, blank out noise characters, collapse whitespace.
///
/// Idempotent: feeding the output back in returns it unchanged.
pub fn normalize_text(input: &str, rules: &NormalizationRules) -> String {
    let lowered = input.to_lowercase();
    let folded: String = if rules.strip_diacritics {
        lowered.nfd().filter(|c| !is_combining_mark(*c)).collect()
    } else {
        lowered.nfc().collect()
    };

    let mut out = String::with_capacity(folded.len());
    for word in folded
        .split(|c: char| c.is_whitespace() || rules.is_noise(c))
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

// ---------------------------------------------------------------------------
// Memoizing normalizer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Normalizer {
    rules: NormalizationRules,
    cache: Option<RwLock<HashMap<String, Arc<str>>>>,
    capacity: Option<usize>,
}

impl Normalizer {
    /// Memoizing normalizer with an unbounded cache.
    pub fn new(rules: NormalizationRules) -> Self {
        Self::with_capacity(rules, None)
    }

    /// Memoizing normalizer that stops inserting once `capacity` raw strings
    /// are cached. Lookups past that point are computed, not stored.
    pub fn with_capacity(rules: NormalizationRules, capacity: Option<usize>) -> Self {
        Self {
            rules,
            cache: Some(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Normalizer without memoization.
    pub fn uncached(rules: NormalizationRules) -> Self {
        Self {
            rules,
            cache: None,
            capacity: None,
        }
    }

    pub fn rules(&self) -> &NormalizationRules {
        &self.rules
    }

    pub fn normalize(&self, text: &str) -> Arc<str> {
        let Some(cache) = &self.cache else {
            return Arc::from(normalize_text(text, &self.rules));
        };

        if let Some(hit) = cache.read().get(text) {
            return Arc::clone(hit);
        }

        let normalized: Arc<str> = Arc::from(normalize_text(text, &self.rules));
        let mut guard = cache.write();
        if self.capacity.map_or(true, |cap| guard.len() < cap) {
            guard
                .entry(text.to_string())
                .or_insert_with(|| Arc::clone(&normalized));
        }
        normalized
    }

    /// Number of raw strings currently memoized.
    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.read().len())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizationRules::default())
    }
}
