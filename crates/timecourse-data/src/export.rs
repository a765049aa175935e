//! Writing the timecourse tables to disk.
//!
//! Tables are tab-delimited. Every file is written to a temporary sibling
//! first and then renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use timecourse_core::error::{Result, TimecourseError};
use tracing::info;

use crate::aggregator::{MonthlySeries, Totals};
use crate::analysis::{TimecourseReport, TimecourseSummary};

const TIMECOURSE_STEM: &str = "describe-timecourse";
const TOTALS_FILE: &str = "describe-totalcounts.tsv";

// ── ExportPaths ───────────────────────────────────────────────────────────────

/// Output file locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub totals: PathBuf,
    pub timecourse: PathBuf,
    pub report_json: PathBuf,
}

impl ExportPaths {
    /// Resolve file names under `results_dir`.
    ///
    /// The timecourse and report names carry `_WHITE` and `_RESTRICT`
    /// suffixes for the matching modes; the totals name never does.
    pub fn new(results_dir: &Path, white: bool, restrict: bool) -> Self {
        let mut stem = TIMECOURSE_STEM.to_string();
        if white {
            stem.push_str("_WHITE");
        }
        if restrict {
            stem.push_str("_RESTRICT");
        }

        Self {
            totals: results_dir.join(TOTALS_FILE),
            timecourse: results_dir.join(format!("{stem}.tsv")),
            report_json: results_dir.join(format!("{stem}.json")),
        }
    }
}

// ── Table writers ─────────────────────────────────────────────────────────────

/// Write the two-row totals table: header `total\tcount`, then posts, users.
pub fn write_totals<W: Write>(writer: W, totals: &Totals) -> Result<()> {
    let mut tsv = tsv_writer(writer);
    tsv.write_record(["total", "count"])?;
    for (label, count) in totals.rows() {
        tsv.write_record([label.to_string(), count.to_string()])?;
    }
    tsv.flush()?;
    Ok(())
}

/// Write one row per month with monthly and cumulative counts.
///
/// With `anonymize` the group breakdown is replaced by one column per series.
pub fn write_timecourse<W: Write>(
    writer: W,
    summary: &TimecourseSummary,
    anonymize: bool,
) -> Result<()> {
    let mut tsv = tsv_writer(writer);

    let series = [
        ("posts", Columns::of(&summary.monthly_post_counts)),
        ("posts_cumulative", Columns::of(&summary.cumulative_post_counts)),
        ("users", Columns::of(&summary.monthly_user_counts)),
        ("users_cumulative", Columns::of(&summary.cumulative_user_counts)),
    ];

    let mut header = vec!["month".to_string()];
    for (prefix, columns) in &series {
        if anonymize {
            header.push((*prefix).to_string());
        } else {
            header.extend(columns.labels.iter().map(|g| format!("{prefix}_{g}")));
        }
    }
    tsv.write_record(&header)?;

    for (i, month) in summary.monthly_post_counts.months.iter().enumerate() {
        let mut row = vec![month.bucket.to_string()];
        for (_, columns) in &series {
            let cells = columns.rows.get(i).map(Vec::as_slice).unwrap_or_default();
            if anonymize {
                row.push(cells.iter().sum::<u64>().to_string());
            } else {
                row.extend(cells.iter().map(u64::to_string));
            }
        }
        tsv.write_record(&row)?;
    }

    tsv.flush()?;
    Ok(())
}

// ── File outputs ──────────────────────────────────────────────────────────────

/// Write the totals table to `path`.
pub fn save_totals(path: &Path, totals: &Totals) -> Result<()> {
    let mut buf = Vec::new();
    write_totals(&mut buf, totals)?;
    write_atomic(path, &buf)?;
    info!("Wrote totals to {}", path.display());
    Ok(())
}

/// Write the timecourse table to `path`.
pub fn save_timecourse(path: &Path, summary: &TimecourseSummary, anonymize: bool) -> Result<()> {
    let mut buf = Vec::new();
    write_timecourse(&mut buf, summary, anonymize)?;
    write_atomic(path, &buf)?;
    info!("Wrote timecourse to {}", path.display());
    Ok(())
}

/// Write the full report (summary and metadata) as pretty JSON.
pub fn save_report_json(path: &Path, report: &TimecourseReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    write_atomic(path, json.as_bytes())?;
    info!("Wrote report to {}", path.display());
    Ok(())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// A series flattened to group labels and per-month count rows.
struct Columns {
    labels: Vec<String>,
    rows: Vec<Vec<u64>>,
}

impl Columns {
    fn of<G: Ord + Clone + std::fmt::Display>(series: &MonthlySeries<G>) -> Self {
        Self {
            labels: series.groups.iter().map(ToString::to_string).collect(),
            rows: series
                .months
                .iter()
                .map(|m| series.groups.iter().map(|g| m.get(g)).collect())
                .collect(),
        }
    }
}

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer)
}

/// Write to a temp file then rename over `path`.
///
/// The parent directory must already exist. A failed rename removes the
/// temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| TimecourseError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes).map_err(write_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_timecourse, summarize, TimecourseOptions};
    use crate::reader::LoadedPosts;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use timecourse_core::models::{Lucidity, PostRecord};
    use timecourse_core::month::MonthWindow;

    fn post(user: &str, y: i32, m: u32, d: u32, lucidity: Lucidity) -> PostRecord {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        PostRecord::new(ts, user, Some(lucidity))
    }

    fn small_options() -> TimecourseOptions {
        TimecourseOptions {
            window: MonthWindow::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
            )
            .unwrap(),
            restrict: false,
        }
    }

    fn scenario_posts() -> Vec<PostRecord> {
        vec![
            post("A", 2020, 1, 3, Lucidity::Lucid),
            post("A", 2020, 1, 20, Lucidity::Nonlucid),
            post("A", 2020, 3, 2, Lucidity::Lucid),
            post("B", 2020, 3, 15, Lucidity::Ambiguous),
        ]
    }

    fn render_timecourse(anonymize: bool) -> String {
        let summary = summarize(&scenario_posts(), &small_options());
        let mut buf = Vec::new();
        write_timecourse(&mut buf, &summary, anonymize).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── ExportPaths ───────────────────────────────────────────────────────────

    #[test]
    fn test_export_paths_plain() {
        let paths = ExportPaths::new(Path::new("/data/results"), false, false);
        assert_eq!(paths.totals, PathBuf::from("/data/results/describe-totalcounts.tsv"));
        assert_eq!(paths.timecourse, PathBuf::from("/data/results/describe-timecourse.tsv"));
        assert_eq!(paths.report_json, PathBuf::from("/data/results/describe-timecourse.json"));
    }

    #[test]
    fn test_export_paths_suffixes() {
        let paths = ExportPaths::new(Path::new("out"), true, true);
        assert_eq!(paths.timecourse, PathBuf::from("out/describe-timecourse_WHITE_RESTRICT.tsv"));
        assert_eq!(paths.totals, PathBuf::from("out/describe-totalcounts.tsv"));

        let restrict_only = ExportPaths::new(Path::new("out"), false, true);
        assert_eq!(
            restrict_only.timecourse,
            PathBuf::from("out/describe-timecourse_RESTRICT.tsv")
        );
    }

    // ── write_totals ──────────────────────────────────────────────────────────

    #[test]
    fn test_write_totals_table() {
        let mut buf = Vec::new();
        write_totals(&mut buf, &Totals { posts: 4, users: 2 }).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "total\tcount\nposts\t4\nusers\t2\n"
        );
    }

    // ── write_timecourse ──────────────────────────────────────────────────────

    #[test]
    fn test_write_timecourse_with_breakdown() {
        let text = render_timecourse(false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "month\t\
             posts_unspecified\tposts_ambiguous\tposts_nonlucid\tposts_lucid\t\
             posts_cumulative_unspecified\tposts_cumulative_ambiguous\t\
             posts_cumulative_nonlucid\tposts_cumulative_lucid\t\
             users_repeat-user\tusers_novel-user\t\
             users_cumulative_repeat-user\tusers_cumulative_novel-user"
        );
        assert_eq!(lines[1], "2020-01\t0\t0\t1\t1\t0\t0\t1\t1\t0\t1\t0\t1");
        assert_eq!(lines[2], "2020-02\t0\t0\t0\t0\t0\t0\t1\t1\t0\t0\t0\t1");
        assert_eq!(lines[3], "2020-03\t0\t1\t0\t1\t0\t1\t1\t2\t1\t1\t1\t2");
    }

    #[test]
    fn test_write_timecourse_anonymized() {
        let text = render_timecourse(true);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "month\tposts\tposts_cumulative\tusers\tusers_cumulative");
        assert_eq!(lines[1], "2020-01\t2\t2\t1\t1");
        assert_eq!(lines[2], "2020-02\t0\t2\t0\t1");
        assert_eq!(lines[3], "2020-03\t2\t4\t2\t3");
    }

    // ── file outputs ──────────────────────────────────────────────────────────

    #[test]
    fn test_save_outputs_into_results_dir() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir(&results).unwrap();
        let paths = ExportPaths::new(&results, false, false);
        let report = analyze_timecourse(
            LoadedPosts {
                posts: scenario_posts(),
                dropped_timestamps: 0,
            },
            &small_options(),
        );

        save_totals(&paths.totals, &report.summary.totals).unwrap();
        save_timecourse(&paths.timecourse, &report.summary, false).unwrap();
        save_report_json(&paths.report_json, &report).unwrap();

        assert_eq!(
            std::fs::read_to_string(&paths.totals).unwrap(),
            "total\tcount\nposts\t4\nusers\t2\n"
        );
        assert!(paths.timecourse.is_file());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.report_json).unwrap()).unwrap();
        assert_eq!(json["summary"]["totals"]["posts"], 4);
        assert_eq!(
            json["summary"]["monthly_user_counts"]["months"][0]["counts"]["novel-user"],
            1
        );
        assert_eq!(json["summary"]["window"]["start"], "2020-01-01");
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("describe-totalcounts.tsv");

        save_totals(&path, &Totals { posts: 1, users: 1 }).unwrap();
        save_totals(&path, &Totals { posts: 9, users: 3 }).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "total\tcount\nposts\t9\nusers\t3\n"
        );
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("describe-totalcounts.tsv");

        let err = save_totals(&path, &Totals { posts: 1, users: 1 }).unwrap_err();
        assert!(matches!(err, TimecourseError::FileWrite { .. }));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("describe-totalcounts.tsv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = save_totals(&path, &Totals { posts: 1, users: 1 }).unwrap_err();
        assert!(matches!(err, TimecourseError::FileWrite { .. }));
        assert!(!dir.path().join("describe-totalcounts.tsv.tmp").exists());
        assert!(path.join("keep").is_file());
    }
}
