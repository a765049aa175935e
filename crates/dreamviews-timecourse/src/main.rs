mod bootstrap;

use anyhow::{Context, Result};
use timecourse_core::settings::Settings;
use timecourse_data::analysis::{analyze_timecourse, TimecourseOptions};
use timecourse_data::export::{self, ExportPaths};
use timecourse_data::reader::load_posts;

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("DreamViews timecourse v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Window: {}..{}, restrict: {}, white: {}",
        settings.window_start,
        settings.window_end,
        settings.restrict,
        settings.white
    );

    // An invalid window aborts before the input is read.
    let options = TimecourseOptions {
        window: settings.window()?,
        restrict: settings.restrict,
    };

    let results_dir = settings.results_dir();
    bootstrap::ensure_directories(&results_dir)?;
    let paths = ExportPaths::new(&results_dir, settings.white, settings.restrict);

    let input = settings.input_path();
    let loaded = load_posts(&input)
        .with_context(|| format!("loading posts from {}", input.display()))?;

    let report = analyze_timecourse(loaded, &options);

    export::save_totals(&paths.totals, &report.summary.totals)?;
    export::save_timecourse(&paths.timecourse, &report.summary, settings.white)?;
    if settings.json {
        export::save_report_json(&paths.report_json, &report)?;
    }

    tracing::info!(
        "Done: {} posts, {} users ({} rows skipped for bad timestamps)",
        report.summary.totals.posts,
        report.summary.totals.users,
        report.metadata.timestamps_dropped
    );

    Ok(())
}
