//! Timecourse analysis pipeline.
//!
//! Turns loaded posts into the monthly post and user series behind the
//! timecourse figure, returning a [`TimecourseReport`] ready for export.

use chrono::Utc;
use serde::Serialize;
use timecourse_core::models::{Lucidity, Novelty, PostRecord};
use timecourse_core::month::MonthWindow;
use tracing::{debug, info};

use crate::aggregator::{MonthlySeries, TimecourseAggregator, Totals};
use crate::novelty::compute_monthly_user_novelty;
use crate::reader::LoadedPosts;

// ── Public types ──────────────────────────────────────────────────────────────

/// What to aggregate and over which window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimecourseOptions {
    pub window: MonthWindow,
    /// Keep only [`Lucidity::RESTRICTED`] posts.
    pub restrict: bool,
}

/// Monthly series and grand totals for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimecourseSummary {
    pub window: MonthWindow,
    pub monthly_post_counts: MonthlySeries<Lucidity>,
    pub monthly_user_counts: MonthlySeries<Novelty>,
    pub cumulative_post_counts: MonthlySeries<Lucidity>,
    pub cumulative_user_counts: MonthlySeries<Novelty>,
    pub totals: Totals,
}

/// Diagnostics produced alongside the summary.
#[derive(Debug, Clone, Serialize)]
pub struct TimecourseMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Rows successfully parsed from the posts table.
    pub posts_loaded: usize,
    /// Rows skipped because their timestamp could not be parsed.
    pub timestamps_dropped: usize,
    /// Posts removed by restrict mode.
    pub posts_restricted_out: usize,
    /// Posts kept but outside the window.
    pub posts_outside_window: usize,
    /// Distinct (user, month) pairs.
    pub user_months: usize,
}

/// The complete output of [`analyze_timecourse`].
#[derive(Debug, Clone, Serialize)]
pub struct TimecourseReport {
    pub summary: TimecourseSummary,
    pub metadata: TimecourseMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Drop every post whose lucidity is outside [`Lucidity::RESTRICTED`].
///
/// Returns the kept posts and the number removed. Untagged posts are removed.
pub fn restrict_to_labeled(posts: Vec<PostRecord>) -> (Vec<PostRecord>, usize) {
    let before = posts.len();
    let kept: Vec<PostRecord> = posts
        .into_iter()
        .filter(|p| p.lucidity.is_some_and(|l| l.is_restricted()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Build the summary for `posts`, applying restrict mode when enabled.
///
/// Posts are placed in the month of their own timestamp and user-months in
/// the month of their earliest post. With a window starting mid-month, a
/// user-month whose earliest post predates the start is left out of the user
/// series even when later posts that month fall inside the window.
///
/// Pure: the same posts and options always give an equal summary.
pub fn summarize(posts: &[PostRecord], options: &TimecourseOptions) -> TimecourseSummary {
    build_summary(posts, options).summary
}

/// A summary and the counts observed while building it.
struct BuiltSummary {
    summary: TimecourseSummary,
    posts_kept: usize,
    posts_restricted_out: usize,
    user_months: usize,
}

fn build_summary(posts: &[PostRecord], options: &TimecourseOptions) -> BuiltSummary {
    let window = options.window;

    let restricted;
    let (posts, posts_restricted_out, lucidity_groups): (&[PostRecord], usize, &[Lucidity]) =
        if options.restrict {
            let (kept, dropped) = restrict_to_labeled(posts.to_vec());
            restricted = kept;
            (restricted.as_slice(), dropped, &Lucidity::RESTRICTED[..])
        } else {
            (posts, 0, &Lucidity::ALL[..])
        };

    let appearances = compute_monthly_user_novelty(posts);

    let monthly_post_counts = TimecourseAggregator::aggregate_monthly(
        posts,
        &window,
        lucidity_groups,
        |p| p.timestamp,
        PostRecord::lucidity_group,
    );
    let monthly_user_counts = TimecourseAggregator::aggregate_monthly(
        &appearances,
        &window,
        &Novelty::ALL,
        |a| a.first_seen,
        |a| a.novelty,
    );

    let summary = TimecourseSummary {
        window,
        cumulative_post_counts: TimecourseAggregator::cumulative(&monthly_post_counts),
        cumulative_user_counts: TimecourseAggregator::cumulative(&monthly_user_counts),
        monthly_post_counts,
        monthly_user_counts,
        totals: TimecourseAggregator::totals(posts),
    };
    BuiltSummary {
        summary,
        posts_kept: posts.len(),
        posts_restricted_out,
        user_months: appearances.len(),
    }
}

/// Run the full pipeline over a loaded posts table.
///
/// 1. Apply restrict mode when enabled.
/// 2. Classify user-months and aggregate both series.
/// 3. Record diagnostics.
pub fn analyze_timecourse(loaded: LoadedPosts, options: &TimecourseOptions) -> TimecourseReport {
    let BuiltSummary {
        summary,
        posts_kept,
        posts_restricted_out,
        user_months,
    } = build_summary(&loaded.posts, options);

    if posts_restricted_out > 0 {
        info!("Restrict mode removed {} posts", posts_restricted_out);
    }

    let in_window = summary.monthly_post_counts.total();
    let posts_outside_window = posts_kept.saturating_sub(in_window as usize);

    debug!(
        "{} posts inside {}..{}, {} outside, {} user-months",
        in_window,
        options.window.start(),
        options.window.end(),
        posts_outside_window,
        user_months
    );
    info!(
        "Totals: {} posts, {} users",
        summary.totals.posts, summary.totals.users
    );

    let metadata = TimecourseMetadata {
        generated_at: Utc::now().to_rfc3339(),
        posts_loaded: loaded.posts.len(),
        timestamps_dropped: loaded.dropped_timestamps,
        posts_restricted_out,
        posts_outside_window,
        user_months,
    };

    TimecourseReport { summary, metadata }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
