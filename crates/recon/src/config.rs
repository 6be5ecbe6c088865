use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::matcher::MatchMode;
use crate::model::SourceFormat;

/// Output artifact name used when nothing else is configured.
pub const DEFAULT_OUTPUT_FILE: &str = "Highlighted_Empmain.xlsx";

/// Opaque red.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "FF0000";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GapConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub main: SourceConfig,
    pub duplicate: SourceConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// Worksheet name for spreadsheet inputs. First sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Single ASCII character, or "auto" to sniff. Comma when unset.
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Decode non-UTF-8 CSV as Windows-1252 instead of failing.
    #[serde(default)]
    pub legacy_encoding: bool,
}

// ---------------------------------------------------------------------------
// Matching + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub mode: MatchMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_xlsx")]
    pub xlsx: String,
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            xlsx: default_xlsx(),
            json: None,
            highlight_color: default_highlight_color(),
        }
    }
}

fn default_xlsx() -> String {
    DEFAULT_OUTPUT_FILE.into()
}

fn default_highlight_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.into()
}

impl OutputConfig {
    /// The highlight color as `0xRRGGBB`.
    pub fn highlight_rgb(&self) -> Result<u32, ConfigError> {
        parse_hex_color(&self.highlight_color).ok_or_else(|| {
            ConfigError::Validation(format!(
                "highlight_color must be six hex digits, got \"{}\"",
                self.highlight_color
            ))
        })
    }
}

/// Parse `RRGGBB`, `#RRGGBB` or `AARRGGBB` (alpha ignored) into `0xRRGGBB`.
pub fn parse_hex_color(input: &str) -> Option<u32> {
    let hex = input.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let rgb = match hex.len() {
        6 => hex,
        8 => hex.get(2..)?,
        _ => return None,
    };
    if !rgb.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(rgb, 16).ok()
}

/// Accepts "auto" or exactly one ASCII character.
pub fn is_valid_delimiter(input: &str) -> bool {
    input.eq_ignore_ascii_case("auto") || (input.len() == 1 && input.is_ascii())
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl GapConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: GapConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (role, source) in [("main", &self.main), ("duplicate", &self.duplicate)] {
            if source.file.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{role}.file is empty")));
            }
            if SourceFormat::from_name(&source.file).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{role}.file \"{}\" has an unsupported suffix (expected .csv or a spreadsheet)",
                    source.file
                )));
            }
            if let Some(ref delim) = source.delimiter {
                if !is_valid_delimiter(delim) {
                    return Err(ConfigError::Validation(format!(
                        "{role}.delimiter must be one ASCII character or \"auto\", got \"{delim}\""
                    )));
                }
            }
        }

        if !self.output.xlsx.to_ascii_lowercase().ends_with(".xlsx") {
            return Err(ConfigError::Validation(format!(
                "output.xlsx must end in .xlsx, got \"{}\"",
                self.output.xlsx
            )));
        }

        self.output.highlight_rgb()?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
