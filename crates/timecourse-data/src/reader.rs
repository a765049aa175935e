//! TSV loading for the DreamViews posts table.
//!
//! Reads the tab-delimited posts export and converts each row into a
//! [`PostRecord`]. Rows whose timestamp cannot be parsed are skipped and
//! counted; every other malformed row aborts the load.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use timecourse_core::error::{Result, TimecourseError};
use timecourse_core::models::{Lucidity, PostRecord};
use timecourse_core::month::parse_timestamp;
use tracing::{debug, info, warn};

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const USER_COLUMN: &str = "user_id";
pub const LUCIDITY_COLUMN: &str = "lucidity";

// ── Public types ──────────────────────────────────────────────────────────────

/// Posts read from one table plus the rows that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedPosts {
    pub posts: Vec<PostRecord>,
    /// Rows excluded because their timestamp could not be parsed.
    pub dropped_timestamps: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the posts table at `path`.
pub fn load_posts(path: &Path) -> Result<LoadedPosts> {
    let file = File::open(path).map_err(|source| TimecourseError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let loaded = read_posts(BufReader::new(file))?;

    info!(
        "Loaded {} posts from {} ({} dropped)",
        loaded.posts.len(),
        path.display(),
        loaded.dropped_timestamps
    );

    Ok(loaded)
}

/// Read a tab-delimited posts table with a header row from any reader.
///
/// The header must name `timestamp`, `user_id` and `lucidity`; other
/// columns are ignored.
pub fn read_posts<R: Read>(reader: R) -> Result<LoadedPosts> {
    let mut tsv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(tsv.headers()?)?;
    let mut loaded = LoadedPosts::default();

    for (i, result) in tsv.records().enumerate() {
        let record = result?;
        let row = i + 1;

        match columns.parse_row(&record, row) {
            Ok(post) => loaded.posts.push(post),
            Err(TimecourseError::UnparseableTimestamp(raw)) => {
                debug!("Row {}: skipping unparseable timestamp {:?}", row, raw);
                loaded.dropped_timestamps += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if loaded.dropped_timestamps > 0 {
        warn!(
            "{} rows skipped because their timestamp could not be parsed",
            loaded.dropped_timestamps
        );
    }

    Ok(loaded)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Positions of the required columns within a header row.
struct ColumnIndex {
    timestamp: usize,
    user_id: usize,
    lucidity: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TimecourseError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            timestamp: find(TIMESTAMP_COLUMN)?,
            user_id: find(USER_COLUMN)?,
            lucidity: find(LUCIDITY_COLUMN)?,
        })
    }

    fn parse_row(&self, record: &StringRecord, row: usize) -> Result<PostRecord> {
        let raw_timestamp = required(record, self.timestamp, row, TIMESTAMP_COLUMN)?;
        let user_id = required(record, self.user_id, row, USER_COLUMN)?;

        let lucidity = match record.get(self.lucidity).map(str::trim) {
            None | Some("") => None,
            Some(label) => Some(label.parse::<Lucidity>()?),
        };

        let timestamp = parse_timestamp(raw_timestamp)?;
        Ok(PostRecord::new(timestamp, user_id, lucidity))
    }
}

/// Fetch a trimmed, non-empty cell.
fn required<'r>(
    record: &'r StringRecord,
    index: usize,
    row: usize,
    column: &'static str,
) -> Result<&'r str> {
    match record.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(TimecourseError::MissingValue { row, column }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
