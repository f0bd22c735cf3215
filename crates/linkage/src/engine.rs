use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::index::ReferenceIndex;
use crate::matcher::{build_engine, rank};
use crate::model::{LinkMeta, LinkOutcome, LinkReport, ScoredCandidate};
use crate::normalize::Normalizer;
use crate::partition::Partitioner;
use crate::pipeline::{link, Execution};
use crate::summary::{compute_summary, near_misses};
use crate::table::{load_csv_table, reference_column, Table};

/// Pre-loaded inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct LinkInput {
    pub primary: Table,
    /// Reference descriptions in table order.
    pub reference: Vec<String>,
}

impl LinkInput {
    /// Parse both CSV sources with the skip rows and reference column the
    /// config names.
    pub fn from_csv(config: &LinkConfig, primary_csv: &str, reference_csv: &str) -> Result<Self, LinkError> {
        let primary = load_csv_table(primary_csv, config.primary.skip_rows)?;
        let reference_table = load_csv_table(reference_csv, config.reference.skip_rows)?;
        let reference = reference_column(&reference_table, &config.reference.column)?;
        Ok(Self { primary, reference })
    }
}

fn build_normalizer(config: &LinkConfig) -> Normalizer {
    Normalizer::with_capacity(
        config.normalization.rules.clone(),
        config.normalization.cache_capacity,
    )
}

/// Run linkage per config. Returns the per-group tables and the run report.
///
/// Every fatal condition (bad threshold, missing column, empty reference,
/// output column conflict) is raised before any record is scored.
pub fn run(config: &LinkConfig, input: LinkInput) -> Result<LinkOutcome, LinkError> {
    let threshold = config.threshold()?;
    let schema = config.primary.schema();

    let mut primary = input.primary;
    let excluded = primary.exclude_rows(&schema.detail, &config.primary.exclude_details)?;
    if excluded > 0 {
        log::debug!("excluded {excluded} rows by detail value");
    }
    let records = schema.records(&primary)?;

    let normalizer = build_normalizer(config);
    let index = ReferenceIndex::build(&input.reference, &normalizer, &config.reference.index)?;
    let partitioner = Partitioner::new(&primary.headers, &schema, &index, &config.output)?;

    let engine = build_engine(config.engine, config.measure);
    let linked = link(
        records,
        &index,
        engine.as_ref(),
        &normalizer,
        threshold,
        Execution::from_workers(config.workers),
    )?;

    let ungrouped = config.output.ungrouped_name.as_str();
    let summary = compute_summary(&linked, ungrouped);
    let near_misses = near_misses(&linked, &index, ungrouped);
    let tables = partitioner.partition(linked)?;

    log::info!(
        "{}: {} records, {} matched, {} unmatched, {} groups",
        config.name,
        summary.total_records,
        summary.matched,
        summary.unmatched,
        summary.total_groups
    );

    Ok(LinkOutcome {
        tables,
        report: LinkReport {
            meta: LinkMeta {
                config_name: config.name.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                threshold: threshold.value(),
                measure: config.measure,
                engine: config.engine,
                reference_candidates: index.len(),
            },
            summary,
            near_misses,
        },
    })
}

/// Score one detail string against the reference set and return the best
/// `limit` candidates, for threshold tuning.
pub fn explain(
    config: &LinkConfig,
    reference: &[String],
    detail: &str,
    limit: usize,
) -> Result<Vec<ScoredCandidate>, LinkError> {
    let normalizer = build_normalizer(config);
    let index = ReferenceIndex::build(reference, &normalizer, &config.reference.index)?;
    let query = normalizer.normalize(detail);
    Ok(rank(&query, &index, config.measure, limit))
}
