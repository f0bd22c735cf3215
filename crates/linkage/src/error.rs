use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Reference set has no usable candidate.
    EmptyReference,
    /// Required column absent from an input table.
    MissingField { field: String },
    /// Threshold outside [0, 100] or not finite.
    InvalidThreshold(f64),
    /// A derived output column collides with an input header.
    ColumnConflict { column: String },
    /// A match result points at a candidate id the index doesn't hold.
    UnknownCandidate { id: usize },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (blank column name, bad date format, etc.).
    ConfigValidation(String),
    /// CSV read error.
    Csv(String),
    /// Worker pool could not be built.
    WorkerPool(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyReference => write!(f, "reference set is empty: no record can ever match"),
            Self::MissingField { field } => {
                write!(f, "missing required column '{field}'")
            }
            Self::InvalidThreshold(value) => {
                write!(f, "threshold must be within [0, 100], got {value}")
            }
            Self::ColumnConflict { column } => {
                write!(f, "output column '{column}' already exists in the primary table")
            }
            Self::UnknownCandidate { id } => {
                write!(f, "match result references unknown candidate #{id}")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::WorkerPool(msg) => write!(f, "worker pool error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<csv::Error> for LinkError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}
