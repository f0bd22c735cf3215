use serde::Deserialize;

use crate::error::LinkError;
use crate::model::Record;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Parsed tabular input: a header row and string cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based source line of each row. Empty for tables built in memory.
    pub lines: Vec<u64>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            lines: Vec::new(),
        }
    }

    /// Source line of row `row`, when the table came from a file.
    pub fn source_line(&self, row: usize) -> Option<u64> {
        self.lines.get(row).copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Drop rows whose `column` cell (trimmed) equals one of `values`.
    /// Returns how many rows were removed.
    pub fn exclude_rows(&mut self, column: &str, values: &[String]) -> Result<usize, LinkError> {
        if values.is_empty() {
            return Ok(0);
        }
        let idx = self.column_index(column).ok_or_else(|| LinkError::MissingField {
            field: column.into(),
        })?;
        let keep: Vec<bool> = self
            .rows
            .iter()
            .map(|row| {
                let cell = row.get(idx).map(|c| c.trim()).unwrap_or("");
                !values.iter().any(|v| v.trim() == cell)
            })
            .collect();
        let before = self.rows.len();
        let mut flags = keep.iter();
        self.rows.retain(|_| flags.next().copied().unwrap_or(true));
        if self.lines.len() == keep.len() {
            let mut flags = keep.iter();
            self.lines.retain(|_| flags.next().copied().unwrap_or(true));
        }
        Ok(before - self.rows.len())
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Names of the primary-table columns the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub detail: String,
    pub group_key: String,
}

impl Schema {
    pub fn new(detail: impl Into<String>, group_key: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            group_key: group_key.into(),
        }
    }

    /// Validate the header row and turn every row into a [`Record`].
    /// Fails before reading any row when a required column is missing.
    /// Short rows are padded to the header width; cells past it are dropped.
    pub fn records(&self, table: &Table) -> Result<Vec<Record>, LinkError> {
        let idx = |name: &str| -> Result<usize, LinkError> {
            table.column_index(name).ok_or_else(|| LinkError::MissingField {
                field: name.into(),
            })
        };
        let detail_idx = idx(&self.detail)?;
        let group_idx = idx(&self.group_key)?;
        let width = table.headers.len();

        let records = table
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                let mut fields = row.clone();
                fields.resize(width, String::new());
                let group = fields[group_idx].trim();
                let group_key = (!group.is_empty()).then(|| group.to_string());
                Record {
                    position,
                    source_line: table.source_line(position),
                    detail: fields[detail_idx].clone(),
                    group_key,
                    fields,
                }
            })
            .collect();
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Reference column
// ---------------------------------------------------------------------------

/// Reference description column, by header name or 0-based position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "column #{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl ColumnSelector {
    /// Position of the selected column within `headers`.
    pub fn resolve(&self, headers: &[String]) -> Result<usize, LinkError> {
        let found = match self {
            Self::Index(i) => (*i < headers.len()).then_some(*i),
            Self::Name(name) => headers.iter().position(|h| h == name),
        };
        found.ok_or_else(|| LinkError::MissingField {
            field: match self {
                Self::Name(name) => name.clone(),
                Self::Index(_) => self.to_string(),
            },
        })
    }
}

/// Extract reference descriptions from `table`, one per row, in order.
pub fn reference_column(table: &Table, selector: &ColumnSelector) -> Result<Vec<String>, LinkError> {
    let idx = selector.resolve(&table.headers)?;
    Ok(table
        .rows
        .iter()
        .map(|row| row.get(idx).cloned().unwrap_or_default())
        .collect())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse CSV text. The first `skip_rows` records are ignored (title blocks
/// above the real header), the next one is the header row. Rows wider than
/// the header get `column_N` headers for the extra cells. Each kept row
/// remembers its 1-based line in `csv_data`.
pub fn load_csv_table(csv_data: &str, skip_rows: usize) -> Result<Table, LinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let mut records = reader.records().skip(skip_rows);

    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|h| h.trim().to_string()).collect(),
        None => {
            return Err(LinkError::Csv(format!(
                "no header row after skipping {skip_rows} row(s)"
            )))
        }
    };

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if let Some(pos) = record.position() {
            lines.push(pos.line());
        }
        rows.push(record.iter().map(|c| c.to_string()).collect::<Vec<String>>());
    }
    if lines.len() != rows.len() {
        lines.clear();
    }

    let mut headers = headers;
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for n in headers.len()..width {
        headers.push(format!("column_{}", n + 1));
    }

    Ok(Table { headers, rows, lines })
}
