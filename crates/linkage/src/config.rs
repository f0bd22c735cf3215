use serde::Deserialize;

use crate::error::LinkError;
use crate::index::IndexOptions;
use crate::matcher::{EngineKind, Measure, Threshold};
use crate::normalize::NormalizationRules;
use crate::partition::OutputOptions;
use crate::table::{ColumnSelector, Schema};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    /// Minimum score (0-100) for a candidate to count as a match.
    pub threshold: f64,
    #[serde(default)]
    pub measure: Measure,
    #[serde(default)]
    pub engine: EngineKind,
    /// Rayon worker count. Omitted or 1 runs sequentially.
    #[serde(default)]
    pub workers: Option<usize>,
    pub primary: PrimaryConfig,
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub output: OutputOptions,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryConfig {
    pub file: String,
    /// Leading rows above the header (report titles, blank lines).
    #[serde(default)]
    pub skip_rows: usize,
    pub detail: String,
    pub group_key: String,
    /// Rows whose detail equals one of these are dropped before linking.
    #[serde(default)]
    pub exclude_details: Vec<String>,
}

impl PrimaryConfig {
    pub fn schema(&self) -> Schema {
        Schema::new(self.detail.clone(), self.group_key.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    pub file: String,
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default = "default_reference_column")]
    pub column: ColumnSelector,
    #[serde(flatten)]
    pub index: IndexOptions,
}

fn default_reference_column() -> ColumnSelector {
    ColumnSelector::Index(0)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizationConfig {
    #[serde(flatten)]
    pub rules: NormalizationRules,
    /// Upper bound on memoized normalizations. Omitted = unbounded.
    #[serde(default)]
    pub cache_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        Threshold::new(self.threshold)?;

        if self.workers == Some(0) {
            return Err(LinkError::ConfigValidation(
                "workers must be at least 1".into(),
            ));
        }

        for (key, value) in [
            ("primary.file", &self.primary.file),
            ("primary.detail", &self.primary.detail),
            ("primary.group_key", &self.primary.group_key),
            ("reference.file", &self.reference.file),
            ("output.match_column", &self.output.match_column),
            ("output.score_column", &self.output.score_column),
        ] {
            if value.trim().is_empty() {
                return Err(LinkError::ConfigValidation(format!("{key} must not be empty")));
            }
        }

        if let ColumnSelector::Name(ref name) = self.reference.column {
            if name.trim().is_empty() {
                return Err(LinkError::ConfigValidation(
                    "reference.column must not be empty".into(),
                ));
            }
        }

        if self.output.columns.iter().any(|c| c.name.trim().is_empty()) {
            return Err(LinkError::ConfigValidation(
                "output.columns entries need a non-empty name".into(),
            ));
        }

        if self.output.match_column == self.output.score_column {
            return Err(LinkError::ConfigValidation(format!(
                "output.match_column and output.score_column are both '{}'",
                self.output.match_column
            )));
        }

        if matches!(self.normalization.cache_capacity, Some(0)) {
            return Err(LinkError::ConfigValidation(
                "normalization.cache_capacity must be at least 1".into(),
            ));
        }

        validate_date_format(&self.output.date_format)?;

        Ok(())
    }

    /// Validated threshold. Call after [`LinkConfig::validate`] or on a
    /// config whose threshold was overridden.
    pub fn threshold(&self) -> Result<Threshold, LinkError> {
        Threshold::new(self.threshold)
    }
}

/// Reject chrono format strings containing invalid specifiers.
fn validate_date_format(format: &str) -> Result<(), LinkError> {
    use chrono::format::{Item, StrftimeItems};

    if format.is_empty() {
        return Err(LinkError::ConfigValidation(
            "output.date_format must not be empty".into(),
        ));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(LinkError::ConfigValidation(format!(
            "output.date_format '{format}' is not a valid chrono format"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
