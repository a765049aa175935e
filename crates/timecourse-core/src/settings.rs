use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimecourseError};
use crate::month::MonthWindow;

/// Posts table location relative to the data root.
pub const DEFAULT_POSTS_FILE: &str = "derivatives/dreamviews-posts.tsv";
/// Output directory relative to the data root.
pub const DEFAULT_RESULTS_DIR: &str = "results";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Monthly post and user timecourse for the DreamViews corpus
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dreamviews-timecourse",
    about = "Monthly post and user timecourse for the DreamViews corpus",
    version
)]
pub struct Settings {
    /// Project data root
    #[arg(long, env = "DREAMVIEWS_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Posts table (defaults to <data-dir>/derivatives/dreamviews-posts.tsv)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output directory (defaults to <data-dir>/results)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// First day of the observation window (inclusive)
    #[arg(long, default_value = "2010-01-01")]
    pub window_start: NaiveDate,

    /// End of the observation window (exclusive)
    #[arg(long, default_value = "2021-01-01")]
    pub window_end: NaiveDate,

    /// Restrict data to lucid and non-lucid labels
    #[arg(long)]
    pub restrict: bool,

    /// Suppress label breakdowns in the exported timecourse
    #[arg(long)]
    pub white: bool,

    /// Also write the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── ProjectConfig ──────────────────────────────────────────────────────────────

/// Optional JSON configuration file passed with `--config`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<bool>,
}

impl ProjectConfig {
    /// Load a config file. A missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TimecourseError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| TimecourseError::Config(format!("invalid {}: {e}", path.display())))
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and merge the config file, if any.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args(args: Vec<OsString>) -> Result<Self> {
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        if let Some(path) = settings.config.clone() {
            let config = ProjectConfig::load_from(&path)?;
            settings.merge_config(config, &matches);
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        Ok(settings)
    }

    /// Apply config values to every field still at its built-in default.
    /// Command-line and environment values always win.
    fn merge_config(&mut self, config: ProjectConfig, matches: &clap::ArgMatches) {
        if is_default(matches, "data_dir") {
            if let Some(v) = config.data_dir {
                self.data_dir = v;
            }
        }
        if is_default(matches, "window_start") {
            if let Some(v) = config.window_start {
                self.window_start = v;
            }
        }
        if is_default(matches, "window_end") {
            if let Some(v) = config.window_end {
                self.window_end = v;
            }
        }
        if is_default(matches, "restrict") {
            if let Some(v) = config.restrict {
                self.restrict = v;
            }
        }
    }

    /// Resolved posts table path.
    pub fn input_path(&self) -> PathBuf {
        self.input
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_POSTS_FILE))
    }

    /// Resolved output directory.
    pub fn results_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_RESULTS_DIR))
    }

    /// The validated observation window.
    pub fn window(&self) -> Result<MonthWindow> {
        MonthWindow::new(self.window_start, self.window_end)
    }
}

/// Returns `true` when `name` still holds its declared default value.
fn is_default(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        None | Some(clap::parser::ValueSource::DefaultValue)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
