// catlink CLI - fuzzy record linkage and grouping

mod exit_codes;
mod export;
mod link;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_ERROR, EXIT_IO, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "catlink")]
#[command(about = "Link free-text records to canonical descriptions and split them by group")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link records per a TOML config and write one CSV per group
    #[command(after_help = "\
Examples:
  catlink run economato.toml
  catlink run economato.toml --out-dir out/janeiro
  catlink run economato.toml --threshold 75 --workers 4
  catlink run economato.toml --json > report.json
  catlink run economato.toml --output report.json --strict")]
    Run {
        /// Path to the linkage config (.toml)
        config: PathBuf,

        /// Directory for the per-group CSV files
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the config threshold (0-100)
        #[arg(long)]
        threshold: Option<f64>,

        /// Override the worker count (1 = sequential)
        #[arg(long, env = "CATLINK_WORKERS")]
        workers: Option<usize>,

        /// Exit 6 when any record is left unmatched
        #[arg(long)]
        strict: bool,
    },

    /// Validate a linkage config without running
    #[command(after_help = "\
Examples:
  catlink validate economato.toml")]
    Validate {
        /// Path to the linkage config (.toml)
        config: PathBuf,
    },

    /// Show the best-scoring reference descriptions for one detail string
    #[command(after_help = "\
Examples:
  catlink explain economato.toml 'Tarifa bancaria mensal'
  catlink explain economato.toml 'ALUGUEL' --limit 10 --json")]
    Explain {
        /// Path to the linkage config (.toml)
        config: PathBuf,

        /// Detail text to score
        detail: String,

        /// Number of candidates to show
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  catlink-linkage ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            out_dir,
            json,
            output,
            threshold,
            workers,
            strict,
        } => link::cmd_run(link::RunArgs {
            config,
            out_dir,
            json,
            output,
            threshold,
            workers,
            strict,
        }),
        Commands::Validate { config } => link::cmd_validate(config),
        Commands::Explain { config, detail, limit, json } => link::cmd_explain(config, detail, limit, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }
}
