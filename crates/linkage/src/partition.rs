use serde::Deserialize;

use crate::error::LinkError;
use crate::index::ReferenceIndex;
use crate::model::{GroupKey, LinkedRecord, OutputRow, OutputTable, PartitionedTables};
use crate::table::{ColumnSelector, Schema};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Header of the appended matched-description column.
    pub match_column: String,
    /// Header of the appended score column.
    pub score_column: String,
    /// Written in the description column of unmatched rows.
    pub no_match_marker: String,
    /// Report/file name of the bucket holding rows without a group key.
    pub ungrouped_name: String,
    /// Also overwrite the detail cell of matched rows with the canonical description.
    pub replace_detail: bool,
    /// Columns reformatted by the exporter when they hold ISO dates.
    pub date_columns: Vec<String>,
    /// chrono format string used for `date_columns`.
    pub date_format: String,
    /// Optional fixed output layout. Empty keeps every input column plus the
    /// two derived ones.
    pub columns: Vec<OutputColumn>,
}

/// One column of a projected output layout.
///
/// `source` and `fallback` select from the full row: the input columns
/// followed by the match and score columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputColumn {
    pub name: String,
    pub source: ColumnSelector,
    /// Read when the `source` cell is blank.
    #[serde(default)]
    pub fallback: Option<ColumnSelector>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            match_column: "matched_description".into(),
            score_column: "match_score".into(),
            no_match_marker: "NO MATCH".into(),
            ungrouped_name: "ungrouped".into(),
            replace_detail: false,
            date_columns: Vec::new(),
            date_format: "%d/%m/%Y".into(),
            columns: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Partitioner
// ---------------------------------------------------------------------------

/// Splits linked records into one table per group key. Validates the output
/// layout up front so a failing run never yields a partial mapping.
#[derive(Debug)]
pub struct Partitioner<'a> {
    headers: Vec<String>,
    /// `(source, fallback)` positions in the full row, when projecting.
    projection: Option<Vec<(usize, Option<usize>)>>,
    input_width: usize,
    detail_index: usize,
    index: &'a ReferenceIndex,
    options: &'a OutputOptions,
}

impl<'a> Partitioner<'a> {
    pub fn new(
        input_headers: &[String],
        schema: &Schema,
        index: &'a ReferenceIndex,
        options: &'a OutputOptions,
    ) -> Result<Self, LinkError> {
        let detail_index = input_headers
            .iter()
            .position(|h| *h == schema.detail)
            .ok_or_else(|| LinkError::MissingField {
                field: schema.detail.clone(),
            })?;

        for column in [&options.match_column, &options.score_column] {
            if input_headers.contains(column) {
                return Err(LinkError::ColumnConflict {
                    column: column.clone(),
                });
            }
        }
        if options.match_column == options.score_column {
            return Err(LinkError::ColumnConflict {
                column: options.score_column.clone(),
            });
        }

        let mut headers = input_headers.to_vec();
        headers.push(options.match_column.clone());
        headers.push(options.score_column.clone());

        let projection = if options.columns.is_empty() {
            None
        } else {
            let mut names: Vec<String> = Vec::with_capacity(options.columns.len());
            let mut slots = Vec::with_capacity(options.columns.len());
            for column in &options.columns {
                if names.contains(&column.name) {
                    return Err(LinkError::ColumnConflict {
                        column: column.name.clone(),
                    });
                }
                let source = column.source.resolve(&headers)?;
                let fallback = column
                    .fallback
                    .as_ref()
                    .map(|f| f.resolve(&headers))
                    .transpose()?;
                names.push(column.name.clone());
                slots.push((source, fallback));
            }
            headers = names;
            Some(slots)
        };

        Ok(Self {
            headers,
            projection,
            input_width: input_headers.len(),
            detail_index,
            index,
            options,
        })
    }

    /// Output header row: input headers plus the two derived columns, or the
    /// projected column names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn partition(&self, linked: Vec<LinkedRecord>) -> Result<PartitionedTables, LinkError> {
        let mut tables = PartitionedTables::new();

        for LinkedRecord { record, result } in linked {
            let description = match result.candidate {
                Some(id) => Some(
                    self.index
                        .get(id)
                        .ok_or(LinkError::UnknownCandidate { id })?
                        .raw
                        .clone(),
                ),
                None => None,
            };

            let mut cells = record.fields;
            cells.resize(self.input_width, String::new());
            if self.options.replace_detail {
                if let Some(ref d) = description {
                    cells[self.detail_index] = d.clone();
                }
            }
            cells.push(description.unwrap_or_else(|| self.options.no_match_marker.clone()));
            cells.push(format!("{:.2}", result.score));
            if let Some(ref slots) = self.projection {
                cells = project(&cells, slots);
            }

            let group = GroupKey::from_cell(record.group_key.as_deref());
            tables
                .entry(group.clone())
                .or_insert_with(|| OutputTable {
                    group,
                    headers: self.headers.clone(),
                    rows: Vec::new(),
                })
                .rows
                .push(OutputRow {
                    position: record.position,
                    cells,
                    matched: result.matched,
                    score: result.score,
                });
        }

        log::debug!("partitioned into {} groups", tables.len());
        Ok(tables)
    }
}

fn project(full: &[String], slots: &[(usize, Option<usize>)]) -> Vec<String> {
    slots
        .iter()
        .map(|&(source, fallback)| {
            let cell = &full[source];
            match fallback {
                Some(f) if cell.trim().is_empty() => full[f].clone(),
                _ => cell.clone(),
            }
        })
        .collect()
}

/// One-shot helper around [`Partitioner`].
pub fn partition(
    linked: Vec<LinkedRecord>,
    input_headers: &[String],
    schema: &Schema,
    index: &ReferenceIndex,
    options: &OutputOptions,
) -> Result<PartitionedTables, LinkError> {
    Partitioner::new(input_headers, schema, index, options)?.partition(linked)
}
