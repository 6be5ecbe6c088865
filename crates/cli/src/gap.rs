//! `gapfind find` / `run` / `validate`: load, match, highlight, report.

use std::fmt;
use std::path::{Path, PathBuf};

use gapfinder_io::{load_pair, Delimiter, InputSource, LoadError, LoadOptions, WriteError, WriteOptions};
use gapfinder_recon::config::SourceConfig;
use gapfinder_recon::{GapConfig, GapReport, MatchMode, RunOptions};

use crate::exit_codes::{EXIT_CONFIG, EXIT_GAPS_FOUND, EXIT_LOAD, EXIT_PROCESS};
use crate::preview::{render_preview, row_span};
use crate::CliError;

/// Marked rows listed individually in the human summary before collapsing.
const MAX_LISTED_ROWS: usize = 20;

// ============================================================================
// Errors
// ============================================================================

/// Failure after both tables loaded: the artifact or report could not be produced.
#[derive(Debug)]
pub enum ProcessError {
    Write(WriteError),
    Report(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(e) => write!(f, "{e}"),
            Self::Report(msg) => write!(f, "cannot write report: {msg}"),
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<WriteError> for ProcessError {
    fn from(e: WriteError) -> Self {
        Self::Write(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        let hint = match &e {
            LoadError::UnsupportedFormat { .. } => {
                Some("inputs must be .csv or a spreadsheet (.xlsx, .xlsm, .xlsb, .xls, .ods)")
            }
            LoadError::Encoding { .. } => Some("re-save as UTF-8, or pass --legacy-encoding"),
            LoadError::Malformed { .. } => Some("check the delimiter; --delimiter auto sniffs it"),
            _ => None,
        };
        let err = CliError { code: EXIT_LOAD, message: e.to_string(), hint: None };
        match hint {
            Some(h) => err.with_hint(h),
            None => err,
        }
    }
}

impl From<ProcessError> for CliError {
    fn from(e: ProcessError) -> Self {
        CliError { code: EXIT_PROCESS, message: e.to_string(), hint: None }
    }
}

fn config_err(e: impl fmt::Display) -> CliError {
    CliError { code: EXIT_CONFIG, message: e.to_string(), hint: None }
}

// ============================================================================
// Job description
// ============================================================================

/// One fully-resolved gap-finding run.
#[derive(Debug, Clone)]
pub struct GapJob {
    pub main: PathBuf,
    pub duplicate: PathBuf,
    pub main_options: LoadOptions,
    pub duplicate_options: LoadOptions,
    pub mode: MatchMode,
    pub xlsx: PathBuf,
    pub report: Option<PathBuf>,
    pub highlight_rgb: u32,
}

/// How results are shown, independent of what is computed.
#[derive(Debug, Clone, Copy)]
pub struct Presentation {
    pub json: bool,
    pub preview: usize,
    pub quiet: bool,
    pub fail_on_gaps: bool,
}

impl GapJob {
    /// Resolve a validated config, with every path taken relative to `base_dir`.
    pub fn from_config(config: &GapConfig, base_dir: &Path) -> Result<Self, CliError> {
        Ok(Self {
            main: base_dir.join(&config.main.file),
            duplicate: base_dir.join(&config.duplicate.file),
            main_options: load_options(&config.main)?,
            duplicate_options: load_options(&config.duplicate)?,
            mode: config.matching.mode,
            xlsx: base_dir.join(&config.output.xlsx),
            report: config.output.json.as_ref().map(|p| base_dir.join(p)),
            highlight_rgb: config.output.highlight_rgb().map_err(config_err)?,
        })
    }
}

fn load_options(source: &SourceConfig) -> Result<LoadOptions, CliError> {
    let delimiter = match source.delimiter.as_deref() {
        None => Delimiter::default(),
        Some(d) => Delimiter::parse(d)
            .ok_or_else(|| config_err(format!("invalid delimiter \"{d}\" for {}", source.file)))?,
    };
    Ok(LoadOptions {
        delimiter,
        sheet: source.sheet.clone(),
        legacy_encoding: source.legacy_encoding,
    })
}

// ============================================================================
// Commands
// ============================================================================

pub fn cmd_find(job: GapJob, presentation: Presentation) -> Result<(), CliError> {
    execute(&job, presentation)
}

pub fn cmd_run(config_path: PathBuf, json: bool, fail_on_gaps: bool) -> Result<(), CliError> {
    let config = GapConfig::from_file(&config_path).map_err(config_err)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let job = GapJob::from_config(&config, base_dir)?;

    if let Some(ref name) = config.name {
        log::info!("running '{name}'");
    }

    let presentation = Presentation { json, preview: 0, quiet: json, fail_on_gaps };
    execute(&job, presentation)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = GapConfig::from_file(&config_path).map_err(config_err)?;
    eprintln!(
        "valid: {} ({} vs {}, {} matching) -> {}",
        config.name.as_deref().unwrap_or("unnamed run"),
        config.main.file,
        config.duplicate.file,
        config.matching.mode,
        config.output.xlsx,
    );
    Ok(())
}

fn execute(job: &GapJob, presentation: Presentation) -> Result<(), CliError> {
    // Both sources must load before anything is written
    let main_source = InputSource::from_path(&job.main)?;
    let duplicate_source = InputSource::from_path(&job.duplicate)?;
    let (main, duplicate) =
        load_pair(&main_source, &job.main_options, &duplicate_source, &job.duplicate_options)?;

    let show_human = !presentation.json && !presentation.quiet;
    if show_human && presentation.preview > 0 {
        println!("{}", render_preview(&main_source.name, &main, presentation.preview));
        println!("{}", render_preview(&duplicate_source.name, &duplicate, presentation.preview));
    }

    let report = gapfinder_recon::run(&main, &duplicate, &RunOptions { mode: job.mode });

    let write_options = WriteOptions {
        highlight_rgb: job.highlight_rgb,
        source: job.main_options.clone(),
    };
    let written = gapfinder_io::write_highlighted(&main_source, &main, report.highlights(), &write_options, &job.xlsx)
        .map_err(ProcessError::from)?;

    let json_str = if presentation.json || job.report.is_some() {
        Some(serde_json::to_string_pretty(&report).map_err(|e| ProcessError::Report(e.to_string()))?)
    } else {
        None
    };

    if let (Some(path), Some(json_str)) = (&job.report, &json_str) {
        std::fs::write(path, json_str)
            .map_err(|e| ProcessError::Report(format!("{}: {e}", path.display())))?;
        if !presentation.quiet {
            eprintln!("wrote {}", path.display());
        }
    }

    if presentation.json {
        if let Some(ref json_str) = json_str {
            println!("{json_str}");
        }
    } else if !presentation.quiet {
        print_summary(&report, &main, &job.xlsx, written.highlighted_rows);
    }

    if presentation.fail_on_gaps && report.summary.marked > 0 {
        return Err(CliError {
            code: EXIT_GAPS_FOUND,
            message: format!("{} row(s) marked", report.summary.marked),
            hint: None,
        });
    }

    Ok(())
}

fn print_summary(report: &GapReport, main: &gapfinder_recon::Table, xlsx: &Path, highlighted: usize) {
    let s = &report.summary;
    println!(
        "{} rows checked against {} duplicate rows ({} matching): {} marked, {} unmarked",
        s.total_rows, s.duplicate_rows, report.meta.match_mode, s.marked, s.unmarked,
    );

    let marked: Vec<_> = report.rows.iter().filter(|r| r.marked).collect();
    for verdict in marked.iter().take(MAX_LISTED_ROWS) {
        let reason = verdict.reason.as_ref().map(|r| r.to_string()).unwrap_or_default();
        println!("  {:<12} {}", row_span(main, verdict.row), reason);
    }
    if marked.len() > MAX_LISTED_ROWS {
        println!("  ... {} more", marked.len() - MAX_LISTED_ROWS);
    }

    println!("wrote {} ({} rows highlighted)", xlsx.display(), highlighted);
}
