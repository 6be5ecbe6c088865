//! `gapfinder-recon`: row-level gap reconciliation.
//!
//! Pure engine crate: receives pre-loaded tables, returns per-row verdicts
//! and highlight marks. No spreadsheet or CLI dependencies.

pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;

pub use config::GapConfig;
pub use differ::{decide_and_mark, Highlights, MarkReason, Verdict};
pub use engine::{run, GapReport, RunOptions};
pub use error::ConfigError;
pub use matcher::{find_best_match, MatchMode};
pub use model::{SharedColumns, SourceFormat, Table, Value};
