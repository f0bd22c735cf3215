//! `catlink run`, `catlink validate` and `catlink explain`: config-driven record linkage.

use std::path::{Path, PathBuf};

use catlink_linkage::{LinkConfig, LinkError, LinkInput};

use crate::exit_codes::{link_exit_code, EXIT_IO, EXIT_UNMATCHED, EXIT_USAGE};
use crate::export::write_group_tables;
use crate::CliError;

fn link_err(err: LinkError) -> CliError {
    let hint = match &err {
        LinkError::MissingField { .. } => {
            Some("check [primary] detail/group_key and [reference] column against the CSV headers".to_string())
        }
        LinkError::EmptyReference => Some("the reference column has no non-blank descriptions".to_string()),
        LinkError::Csv(_) => Some("check skip_rows: it counts the non-blank lines above the header".to_string()),
        _ => None,
    };
    CliError {
        code: link_exit_code(&err),
        message: err.to_string(),
        hint,
    }
}

fn read_file(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_IO,
        message: format!("cannot read {what} {}: {e}", path.display()),
        hint: None,
    })
}

fn load_config(config_path: &Path) -> Result<LinkConfig, CliError> {
    let config_str = read_file(config_path, "config")?;
    LinkConfig::from_toml(&config_str).map_err(link_err)
}

/// Input paths in the config are relative to the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn load_input(config: &LinkConfig, config_path: &Path) -> Result<LinkInput, CliError> {
    let base = base_dir(config_path);
    let primary = read_file(&base.join(&config.primary.file), "primary table")?;
    let reference = read_file(&base.join(&config.reference.file), "reference table")?;
    LinkInput::from_csv(config, &primary, &reference).map_err(link_err)
}

// ============================================================================
// run
// ============================================================================

pub struct RunArgs {
    pub config: PathBuf,
    pub out_dir: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub workers: Option<usize>,
    pub strict: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.config)?;

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError {
                code: EXIT_USAGE,
                message: "--workers must be at least 1".into(),
                hint: None,
            });
        }
        config.workers = Some(workers);
    }
    config.validate().map_err(link_err)?;

    let input = load_input(&config, &args.config)?;
    let outcome = catlink_linkage::run(&config, input).map_err(link_err)?;

    let written = write_group_tables(&outcome.tables, &args.out_dir, &config.output)?;

    let json_str = serde_json::to_string_pretty(&outcome.report)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &outcome.report.summary;
    eprintln!(
        "linked '{}': {} records, {} matched, {} unmatched ({} empty details), {} group file(s) in {}",
        config.name,
        s.total_records,
        s.matched,
        s.unmatched,
        s.empty_details,
        written.len(),
        args.out_dir.display(),
    );
    for (group, counts) in &s.group_counts {
        eprintln!("  {group}: {}/{} matched", counts.matched, counts.rows);
    }

    if args.strict && s.unmatched > 0 {
        return Err(CliError {
            code: EXIT_UNMATCHED,
            message: format!("{} record(s) without a match", s.unmatched),
            hint: Some("lower the threshold or inspect a detail with `catlink explain`".into()),
        });
    }

    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: '{}' threshold {} ({}, {} engine), {} -> {}",
        config.name,
        config.threshold,
        config.measure,
        config.engine,
        config.primary.file,
        config.reference.file,
    );
    Ok(())
}

// ============================================================================
// explain
// ============================================================================

pub fn cmd_explain(config_path: PathBuf, detail: String, limit: usize, json: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let input = load_input(&config, &config_path)?;
    let ranked = catlink_linkage::explain(&config, &input.reference, &detail, limit).map_err(link_err)?;

    if json {
        let json_str = serde_json::to_string_pretty(&ranked)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for (i, c) in ranked.iter().enumerate() {
        let verdict = if i == 0 && c.score >= config.threshold { "match" } else { "" };
        println!("{:>6.2}  {:<5}  {}", c.score, verdict, c.description);
    }
    if ranked.is_empty() {
        eprintln!("'{detail}' is empty after normalization");
    }
    Ok(())
}
