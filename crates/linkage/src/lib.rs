//! `catlink-linkage`: fuzzy record linkage and grouping engine.
//!
//! Pure engine crate: receives pre-loaded tables, links every primary record
//! to its closest canonical description and returns one table per group key.
//! No CLI or file IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod summary;
pub mod table;

pub use config::LinkConfig;
pub use engine::{explain, run, LinkInput};
pub use error::LinkError;
pub use index::ReferenceIndex;
pub use matcher::{build_engine, EngineKind, MatchEngine, Measure, Threshold};
pub use model::{GroupKey, LinkOutcome, LinkReport, OutputTable, PartitionedTables};
pub use normalize::Normalizer;
pub use table::{load_csv_table, Schema, Table};
