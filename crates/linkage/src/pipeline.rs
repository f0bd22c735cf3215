use rayon::prelude::*;

use crate::error::LinkError;
use crate::index::ReferenceIndex;
use crate::matcher::{MatchEngine, Threshold};
use crate::model::{LinkedRecord, Record};
use crate::normalize::Normalizer;

/// How per-record work units are scheduled. Output is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Sequential,
    /// Rayon workers. `None` uses the global pool, `Some(n)` a dedicated pool
    /// of `n` threads.
    Parallel { workers: Option<usize> },
}

impl Execution {
    pub fn from_workers(workers: Option<usize>) -> Self {
        match workers {
            None | Some(1) => Self::Sequential,
            Some(n) => Self::Parallel { workers: Some(n) },
        }
    }
}

/// Normalize one record's detail and resolve its best match.
pub fn link_one(
    record: Record,
    index: &ReferenceIndex,
    engine: &dyn MatchEngine,
    normalizer: &Normalizer,
    threshold: Threshold,
) -> LinkedRecord {
    let query = normalizer.normalize(&record.detail);
    let result = engine.best_match(&query, index, threshold);
    LinkedRecord { record, result }
}

/// Link every record, in input order. Unmatched records stay in the output.
pub fn link(
    records: Vec<Record>,
    index: &ReferenceIndex,
    engine: &dyn MatchEngine,
    normalizer: &Normalizer,
    threshold: Threshold,
    execution: Execution,
) -> Result<Vec<LinkedRecord>, LinkError> {
    let total = records.len();
    let one = |record: Record| link_one(record, index, engine, normalizer, threshold);

    let linked: Vec<LinkedRecord> = match execution {
        Execution::Sequential => records.into_iter().map(one).collect(),
        Execution::Parallel { workers: None } => records.into_par_iter().map(one).collect(),
        Execution::Parallel { workers: Some(n) } => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| LinkError::WorkerPool(e.to_string()))?;
            pool.install(|| records.into_par_iter().map(one).collect())
        }
    };

    debug_assert_eq!(linked.len(), total);
    log::debug!(
        "linked {} records ({} matched, {:?}, {} cached normalizations)",
        total,
        linked.iter().filter(|l| l.result.matched).count(),
        execution,
        normalizer.cached_entries()
    );
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOptions;
    use crate::matcher::{build_engine, EngineKind, Measure};
    use crate::model::MatchResult;

    fn record(position: usize, detail: &str, group: &str) -> Record {
        Record {
            position,
            source_line: None,
            detail: detail.into(),
            group_key: (!group.is_empty()).then(|| group.to_string()),
            fields: vec![detail.into(), group.into()],
        }
    }

    fn setup() -> (ReferenceIndex, Normalizer) {
        let normalizer = Normalizer::default();
        let index = ReferenceIndex::build(
            ["Widget A", "Widget B", "Energia Elétrica", "Aluguel"],
            &normalizer,
            &IndexOptions::default(),
        )
        .unwrap();
        (index, normalizer)
    }

    fn records() -> Vec<Record> {
        vec![
            record(0, "widget a", "G1"),
            record(1, "totally unrelated", "G1"),
            record(2, "Widget B", "G2"),
            record(3, "", "G2"),
            record(4, "   ", ""),
            record(5, "ENERGIA ELETRICA", "G3"),
            record(6, "aluguel", "G1"),
            record(7, "widget a", "G3"),
        ]
    }

    #[test]
    fn one_output_per_record_in_order() {
        let (index, normalizer) = setup();
        let engine = build_engine(EngineKind::Pruned, Measure::TokenSort);
        let linked = link(
            records(),
            &index,
            engine.as_ref(),
            &normalizer,
            Threshold::new(80.0).unwrap(),
            Execution::Sequential,
        )
        .unwrap();

        assert_eq!(linked.len(), 8);
        let positions: Vec<usize> = linked.iter().map(|l| l.record.position).collect();
        assert_eq!(positions, (0..8).collect::<Vec<_>>());

        assert_eq!(linked[0].result.candidate, Some(0));
        assert!(!linked[1].result.matched);
        assert_eq!(linked[2].result.candidate, Some(1));
        assert_eq!(linked[5].result.candidate, Some(2));
    }

    #[test]
    fn empty_details_are_unmatched_with_zero_score() {
        let (index, normalizer) = setup();
        let engine = build_engine(EngineKind::Scan, Measure::PartialTokenSort);
        let linked = link(
            records(),
            &index,
            engine.as_ref(),
            &normalizer,
            Threshold::new(0.0).unwrap(),
            Execution::Sequential,
        )
        .unwrap();
        assert_eq!(linked[3].result, MatchResult::empty());
        assert_eq!(linked[4].result, MatchResult::empty());
    }

    #[test]
    fn parallel_matches_sequential() {
        let (index, normalizer) = setup();
        let engine = build_engine(EngineKind::Pruned, Measure::Adaptive);
        let threshold = Threshold::new(75.0).unwrap();
        let sequential =
            link(records(), &index, engine.as_ref(), &normalizer, threshold, Execution::Sequential).unwrap();
        for workers in [None, Some(2), Some(4)] {
            let parallel = link(
                records(),
                &index,
                engine.as_ref(),
                &normalizer,
                threshold,
                Execution::Parallel { workers },
            )
            .unwrap();
            assert_eq!(parallel, sequential, "workers {workers:?}");
        }
    }

    #[test]
    fn populates_normalizer_cache() {
        let (index, normalizer) = setup();
        normalizer.clear_cache();
        let engine = build_engine(EngineKind::Pruned, Measure::TokenSort);
        link(
            records(),
            &index,
            engine.as_ref(),
            &normalizer,
            Threshold::new(80.0).unwrap(),
            Execution::Sequential,
        )
        .unwrap();
        // "widget a" appears twice; 7 distinct raw details.
        assert_eq!(normalizer.cached_entries(), 7);
    }

    #[test]
    fn workers_map_to_execution() {
        assert_eq!(Execution::from_workers(None), Execution::Sequential);
        assert_eq!(Execution::from_workers(Some(1)), Execution::Sequential);
        assert_eq!(
            Execution::from_workers(Some(8)),
            Execution::Parallel { workers: Some(8) }
        );
    }
}
