//! CLI Exit Code Registry
//!
//! Single source of truth for `gapfind` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments)                          |
//! | 3    | An input could not be loaded                         |
//! | 4    | Processing failed (output artifact or report)        |
//! | 5    | Run config could not be read or is invalid           |
//! | 6    | Gaps found (only with `--fail-on-gaps`)              |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
/// Also what clap exits with on parse failure.
pub const EXIT_USAGE: u8 = 2;

/// Main or duplicate source is missing, unsupported, or unparseable.
pub const EXIT_LOAD: u8 = 3;

/// Highlighted workbook or JSON report could not be produced.
pub const EXIT_PROCESS: u8 = 4;

/// TOML run config failed to read, parse, or validate.
pub const EXIT_CONFIG: u8 = 5;

/// At least one main row was marked and `--fail-on-gaps` was given.
pub const EXIT_GAPS_FOUND: u8 = 6;
