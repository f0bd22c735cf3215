use serde::Deserialize;

use crate::error::LinkError;
use crate::matcher::sort_tokens;
use crate::model::Candidate;
use crate::normalize::Normalizer;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexOptions {
    /// Compare on the text after a leading `"<code> - "`, e.g. "3.01 - Aluguel"
    /// is compared as "Aluguel". Matches still report the full raw text.
    #[serde(default)]
    pub strip_code_prefix: bool,
}

/// Canonical descriptions, normalized once and shared read-only by every query.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    candidates: Vec<Candidate>,
}

impl ReferenceIndex {
    /// Build from reference descriptions in table order. Blank rows and rows
    /// that normalize to nothing are skipped; the remaining candidates keep
    /// their original row positions as ids.
    pub fn build<I, S>(
        descriptions: I,
        normalizer: &Normalizer,
        options: &IndexOptions,
    ) -> Result<Self, LinkError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        for (id, raw) in descriptions.into_iter().enumerate() {
            let raw = raw.as_ref();
            let normalized = normalizer.normalize(comparison_text(raw, options.strip_code_prefix));
            if normalized.is_empty() {
                skipped += 1;
                continue;
            }
            let sorted = sort_tokens(&normalized);
            let sorted_len = sorted.chars().count();
            candidates.push(Candidate {
                id,
                raw: raw.to_string(),
                normalized: normalized.to_string(),
                sorted,
                sorted_len,
            });
        }

        if candidates.is_empty() {
            return Err(LinkError::EmptyReference);
        }

        log::debug!(
            "reference index: {} candidates ({} blank rows skipped)",
            candidates.len(),
            skipped
        );

        Ok(Self { candidates })
    }

    /// `(candidate_id, normalized_text)` in original order.
    pub fn all(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.candidates.iter().map(|c| (c.id, c.normalized.as_str()))
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, id: usize) -> Option<&Candidate> {
        self.candidates
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.candidates[i])
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

fn comparison_text(raw: &str, strip_code_prefix: bool) -> &str {
    if strip_code_prefix {
        if let Some((_, rest)) = raw.split_once(" - ") {
            return rest.trim();
        }
    }
    raw.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(descriptions: &[&str], strip_code_prefix: bool) -> Result<ReferenceIndex, LinkError> {
        ReferenceIndex::build(
            descriptions.iter().copied(),
            &Normalizer::default(),
            &IndexOptions { strip_code_prefix },
        )
    }

    #[test]
    fn preserves_order_and_ids() {
        let index = build(&["Widget B", "Widget A"], false).unwrap();
        let all: Vec<_> = index.all().collect();
        assert_eq!(all, vec![(0, "widget b"), (1, "widget a")]);
    }

    #[test]
    fn empty_reference_is_an_error() {
        assert_eq!(build(&[], false).unwrap_err(), LinkError::EmptyReference);
        assert_eq!(build(&["", "   ", "--"], false).unwrap_err(), LinkError::EmptyReference);
    }

    #[test]
    fn blank_rows_keep_later_ids() {
        let index = build(&["Aluguel", "", "Energia"], false).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(2).unwrap().raw, "Energia");
        assert!(index.get(1).is_none());
    }

    #[test]
    fn code_prefix_stripped_for_comparison_only() {
        let index = build(&["3.01 - Aluguel e Condomínio"], true).unwrap();
        let c = index.get(0).unwrap();
        assert_eq!(c.normalized, "aluguel e condominio");
        assert_eq!(c.raw, "3.01 - Aluguel e Condomínio");

        let kept = build(&["3.01 - Aluguel"], false).unwrap();
        assert_eq!(kept.get(0).unwrap().normalized, "3 01 aluguel");
    }

    #[test]
    fn precomputes_sorted_tokens() {
        let index = build(&["Tarifa Bancária Mensal"], false).unwrap();
        let c = index.get(0).unwrap();
        assert_eq!(c.sorted, "bancaria mensal tarifa");
        assert_eq!(c.sorted_len, c.sorted.chars().count());
    }
}
