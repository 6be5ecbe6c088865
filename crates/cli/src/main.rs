// gapfind - find attendance rows that have no clean counterpart in a duplicate roster

mod exit_codes;
mod gap;
mod preview;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};
use gap::{GapJob, Presentation};
use gapfinder_io::{Delimiter, LoadOptions};
use gapfinder_recon::config::{DEFAULT_HIGHLIGHT_COLOR, DEFAULT_OUTPUT_FILE};
use gapfinder_recon::MatchMode;

#[derive(Parser)]
#[command(name = "gapfind")]
#[command(about = "Highlight main-roster rows missing or different in a duplicate roster")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a main table against a duplicate table and write a highlighted copy
    #[command(after_help = "\
A main row is marked when the duplicate table is empty, or when its best-matching \
duplicate row has an empty or different value in any column both tables share. \
Marked rows are filled red in the output workbook.

Examples:
  gapfind find Empmain.xlsx Empdup.csv
  gapfind find main.csv dup.csv -o gaps.xlsx --json
  gapfind find main.xlsx dup.xlsx --sheet Roster --match-mode named
  gapfind find main.csv dup.csv --delimiter auto --report gaps.json
  gapfind find main.csv dup.csv --quiet --fail-on-gaps")]
    Find {
        /// Main table (.csv or spreadsheet)
        main: PathBuf,

        /// Duplicate table to check against (.csv or spreadsheet)
        duplicate: PathBuf,

        /// Output workbook
        #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Print the JSON report to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// How a main row picks its best duplicate row
        #[arg(long, value_enum, default_value_t = MatchModeArg::Positional)]
        match_mode: MatchModeArg,

        /// CSV delimiter: a single character, or "auto" to sniff
        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: Delimiter,

        /// Worksheet of the main table (first sheet by default)
        #[arg(long)]
        sheet: Option<String>,

        /// Worksheet of the duplicate table (first sheet by default)
        #[arg(long)]
        duplicate_sheet: Option<String>,

        /// Decode non-UTF-8 CSV as Windows-1252 instead of failing
        #[arg(long)]
        legacy_encoding: bool,

        /// Rows of each table to preview (0 to disable)
        #[arg(long, default_value_t = 5, value_name = "N")]
        preview: usize,

        /// Fill color for marked rows (RRGGBB)
        #[arg(long, default_value = DEFAULT_HIGHLIGHT_COLOR, value_parser = parse_color)]
        color: u32,

        /// Suppress previews and the summary
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Exit 6 when any row is marked
        #[arg(long)]
        fail_on_gaps: bool,
    },

    /// Run from a TOML config file
    #[command(after_help = "\
Paths in the config resolve relative to the config file's directory.

Examples:
  gapfind run march.toml
  gapfind run march.toml --json --fail-on-gaps")]
    Run {
        /// Path to the .toml config
        config: PathBuf,

        /// Print the JSON report to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Exit 6 when any row is marked
        #[arg(long)]
        fail_on_gaps: bool,
    },

    /// Validate a TOML config without running it
    #[command(after_help = "\
Examples:
  gapfind validate march.toml")]
    Validate {
        /// Path to the .toml config
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchModeArg {
    /// Compare every field by position
    Positional,
    /// Compare shared columns by name
    Named,
}

impl From<MatchModeArg> for MatchMode {
    fn from(arg: MatchModeArg) -> Self {
        match arg {
            MatchModeArg::Positional => MatchMode::Positional,
            MatchModeArg::Named => MatchMode::Named,
        }
    }
}

fn parse_delimiter(s: &str) -> Result<Delimiter, String> {
    Delimiter::parse(s).ok_or_else(|| format!("expected a single ASCII character or \"auto\", got \"{s}\""))
}

fn parse_color(s: &str) -> Result<u32, String> {
    gapfinder_recon::config::parse_hex_color(s).ok_or_else(|| format!("expected six hex digits, got \"{s}\""))
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  gapfinder-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  gapfinder-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Find {
            main,
            duplicate,
            output,
            json,
            report,
            match_mode,
            delimiter,
            sheet,
            duplicate_sheet,
            legacy_encoding,
            preview,
            color,
            quiet,
            fail_on_gaps,
        } => {
            if !output.to_string_lossy().to_ascii_lowercase().ends_with(".xlsx") {
                Err(CliError::args(format!("output must be an .xlsx file, got {}", output.display()))
                    .with_hint("the highlighted copy is always written as XLSX"))
            } else {
                let job = GapJob {
                    main,
                    duplicate,
                    main_options: LoadOptions { delimiter, sheet, legacy_encoding },
                    duplicate_options: LoadOptions { delimiter, sheet: duplicate_sheet, legacy_encoding },
                    mode: match_mode.into(),
                    xlsx: output,
                    report,
                    highlight_rgb: color,
                };
                gap::cmd_find(job, Presentation { json, preview, quiet, fail_on_gaps })
            }
        }
        Commands::Run { config, json, fail_on_gaps } => gap::cmd_run(config, json, fail_on_gaps),
        Commands::Validate { config } => gap::cmd_validate(config),
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
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn find_defaults() {
        let cli = Cli::try_parse_from(["gapfind", "find", "main.xlsx", "dup.csv"]).unwrap();
        match cli.command {
            Commands::Find { output, delimiter, preview, color, match_mode, .. } => {
                assert_eq!(output, PathBuf::from("Highlighted_Empmain.xlsx"));
                assert_eq!(delimiter, Delimiter::Byte(b','));
                assert_eq!(preview, 5);
                assert_eq!(color, 0xFF0000);
                assert_eq!(MatchMode::from(match_mode), MatchMode::Positional);
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn find_rejects_bad_delimiter() {
        let err = Cli::try_parse_from(["gapfind", "find", "a.csv", "b.csv", "--delimiter", ";;"]);
        assert!(err.is_err());
        let ok = Cli::try_parse_from(["gapfind", "find", "a.csv", "b.csv", "--delimiter", "auto"]);
        assert!(ok.is_ok());
    }
}
