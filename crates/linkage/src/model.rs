use std::collections::BTreeMap;

use serde::Serialize;

use crate::matcher::{EngineKind, Measure};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One primary-table row after schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Row position in the loaded primary table.
    pub position: usize,
    /// 1-based line in the source file, when the table was read from one.
    pub source_line: Option<u64>,
    pub detail: String,
    /// `None` when the group cell is empty or blank.
    pub group_key: Option<String>,
    /// Every original cell, in header order.
    pub fields: Vec<String>,
}

/// One usable reference entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Row position in the reference table.
    pub id: usize,
    pub raw: String,
    pub normalized: String,
    /// `normalized` with its tokens sorted, precomputed for token-sort scoring.
    pub sorted: String,
    /// Char count of `sorted`.
    pub sorted_len: usize,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Matched candidate id; `None` when below threshold or not scored.
    pub candidate: Option<usize>,
    /// Best-scoring candidate even when below threshold.
    pub nearest: Option<usize>,
    pub score: f64,
    pub matched: bool,
}

impl MatchResult {
    /// Result for a detail that is empty after normalization. Nothing is scored.
    pub fn empty() -> Self {
        Self {
            candidate: None,
            nearest: None,
            score: 0.0,
            matched: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkedRecord {
    pub record: Record,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub id: usize,
    pub description: String,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Partition key. Blank or missing group cells collect under `Ungrouped`,
/// which orders after every named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Named(String),
    Ungrouped,
}

impl GroupKey {
    pub fn from_cell(cell: Option<&str>) -> Self {
        match cell.map(str::trim) {
            Some(v) if !v.is_empty() => Self::Named(v.to_string()),
            _ => Self::Ungrouped,
        }
    }

    /// Name used for reporting and file naming.
    pub fn label<'a>(&'a self, ungrouped_name: &'a str) -> &'a str {
        match self {
            Self::Named(name) => name,
            Self::Ungrouped => ungrouped_name,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Ungrouped => write!(f, "(ungrouped)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// Position of the source record in the primary table.
    pub position: usize,
    /// Original cells followed by the description and score columns.
    pub cells: Vec<String>,
    pub matched: bool,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub group: GroupKey,
    pub headers: Vec<String>,
    pub rows: Vec<OutputRow>,
}

impl OutputTable {
    pub fn matched_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.matched).count()
    }
}

pub type PartitionedTables = BTreeMap<GroupKey, OutputTable>;

// ---------------------------------------------------------------------------
// Summary + Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCounts {
    pub rows: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub total_records: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Unmatched records whose detail was empty after normalization.
    pub empty_details: usize,
    pub total_groups: usize,
    pub group_counts: BTreeMap<String, GroupCounts>,
}

/// An unmatched record with its closest candidate, for threshold tuning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearMiss {
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u64>,
    pub group: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub threshold: f64,
    pub measure: Measure,
    pub engine: EngineKind,
    pub reference_candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub meta: LinkMeta,
    pub summary: LinkSummary,
    pub near_misses: Vec<NearMiss>,
}

/// Everything a run produces: the per-group tables for export and the
/// serializable report.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub tables: PartitionedTables,
    pub report: LinkReport,
}
