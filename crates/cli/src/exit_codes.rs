//! CLI Exit Code Registry
//!
//! Single source of truth for `catlink` exit codes. Scripts branch on them,
//! so existing values never change meaning.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success                                                        |
//! | 1    | General error (unspecified)                                    |
//! | 2    | Usage error (bad arguments)                                    |
//! | 3    | Invalid config (TOML parse or validation failure)              |
//! | 4    | Invalid input (missing column, empty reference, bad threshold) |
//! | 5    | IO error (cannot read inputs or write outputs)                 |
//! | 6    | Unmatched records present and `--strict` was given             |

use catlink_linkage::LinkError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, conflicting overrides.
pub const EXIT_USAGE: u8 = 2;

/// Config file could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input tables are unusable: a required column is missing, the reference
/// set is empty, or the threshold is out of range.
pub const EXIT_INVALID_INPUT: u8 = 4;

/// Reading an input file or writing an output file failed.
pub const EXIT_IO: u8 = 5;

/// Run completed but some records found no match (`run --strict`).
pub const EXIT_UNMATCHED: u8 = 6;

/// Map an engine error to its exit code.
pub fn link_exit_code(err: &LinkError) -> u8 {
    match err {
        LinkError::ConfigParse(_) | LinkError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        LinkError::EmptyReference
        | LinkError::MissingField { .. }
        | LinkError::InvalidThreshold(_)
        | LinkError::ColumnConflict { .. }
        | LinkError::Csv(_) => EXIT_INVALID_INPUT,
        LinkError::Io(_) => EXIT_IO,
        LinkError::UnknownCandidate { .. } | LinkError::WorkerPool(_) => EXIT_ERROR,
    }
}
