//! Per-group CSV export for `catlink run`.
//!
//! One file per group, named after the sanitized group label. Labels that
//! collide after sanitizing get a numeric suffix so no group overwrites
//! another.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use catlink_linkage::model::{OutputTable, PartitionedTables};
use catlink_linkage::partition::OutputOptions;

use crate::CliError;

// ── File names ──────────────────────────────────────────────────────

/// Device names Windows reserves regardless of extension.
const RESERVED_STEMS: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Replace characters that are invalid in file names on common platforms
/// (`<>:"/\|?*` and control characters) with `_`.
///
/// Trailing dots and spaces, which Windows silently drops, become a single
/// `_`. Reserved device names get a `_` appended to the part before the
/// first dot (`CON` -> `CON_`, `nul.x` -> `nul_.x`).
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut out = cleaned.trim_end_matches(['.', ' ']).to_string();
    if out.len() != cleaned.len() {
        out.push('_');
    }
    if out.trim().is_empty() {
        return "_".to_string();
    }

    let stem_end = out.find('.').unwrap_or(out.len());
    let stem = out[..stem_end].trim_end();
    if RESERVED_STEMS.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        out.insert(stem_end, '_');
    }
    out
}

/// File stem per table, in table order. Stems are unique ignoring case.
pub fn file_stems(tables: &PartitionedTables, ungrouped_name: &str) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut stems = Vec::with_capacity(tables.len());

    for key in tables.keys() {
        let base = sanitize_file_name(key.label(ungrouped_name));
        let mut stem = base.clone();
        let mut n = 2;
        while !taken.insert(stem.to_lowercase()) {
            stem = format!("{base}-{n}");
            n += 1;
        }
        stems.push(stem);
    }
    stems
}

// ── Dates ───────────────────────────────────────────────────────────

fn parse_iso(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
}

/// Reformat an ISO date (optionally with a time part) with `format`.
/// Anything else passes through unchanged.
pub fn format_date_cell(value: &str, format: &str) -> String {
    let Some(date) = parse_iso(value) else {
        return value.to_string();
    };
    let mut out = String::new();
    match write!(out, "{}", date.format(format)) {
        Ok(()) => out,
        Err(_) => value.to_string(),
    }
}

/// Column indexes of `table` that hold dates to reformat.
fn date_indexes(table: &OutputTable, options: &OutputOptions) -> Vec<usize> {
    options
        .date_columns
        .iter()
        .filter_map(|name| {
            let idx = table.headers.iter().position(|h| h == name);
            if idx.is_none() {
                log::warn!("date column '{name}' not found in output headers");
            }
            idx
        })
        .collect()
}

// ── Writing ─────────────────────────────────────────────────────────

fn write_table(table: &OutputTable, path: &Path, options: &OutputOptions) -> Result<(), CliError> {
    let dates = date_indexes(table, options);
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", path.display())))?;

    writer
        .write_record(&table.headers)
        .map_err(|e| CliError::io(format!("write error: {e}")))?;

    for row in &table.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if dates.contains(&i) {
                    format_date_cell(cell, &options.date_format)
                } else {
                    cell.clone()
                }
            })
            .collect();
        writer
            .write_record(&cells)
            .map_err(|e| CliError::io(format!("write error: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))
}

/// Write every group table to `<out_dir>/<stem>.csv`. Returns the paths in
/// group order.
pub fn write_group_tables(
    tables: &PartitionedTables,
    out_dir: &Path,
    options: &OutputOptions,
) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", out_dir.display())))?;

    let stems = file_stems(tables, &options.ungrouped_name);
    let mut written = Vec::with_capacity(tables.len());
    for (table, stem) in tables.values().zip(stems) {
        let path = out_dir.join(format!("{stem}.csv"));
        write_table(table, &path, options)?;
        log::debug!("wrote {} rows to {}", table.rows.len(), path.display());
        written.push(path);
    }
    Ok(written)
}
