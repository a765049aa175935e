//! Month-bucketed counting over a fixed observation window.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;
use timecourse_core::models::PostRecord;
use timecourse_core::month::{MonthBucket, MonthWindow};
use tracing::debug;

// ── MonthlyCounts ─────────────────────────────────────────────────────────────

/// Per-group counts for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCounts<G> {
    pub bucket: MonthBucket,
    pub counts: BTreeMap<G, u64>,
}

impl<G: Ord> MonthlyCounts<G> {
    /// Count for `group`; zero when the group never occurred.
    pub fn get(&self, group: &G) -> u64 {
        self.counts.get(group).copied().unwrap_or(0)
    }

    /// Sum over all groups.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

// ── MonthlySeries ─────────────────────────────────────────────────────────────

/// One [`MonthlyCounts`] per month of a window, in chronological order.
///
/// `groups` lists the declared groups in presentation order; every declared
/// group has an entry (possibly zero) in every month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySeries<G> {
    pub groups: Vec<G>,
    pub months: Vec<MonthlyCounts<G>>,
}

impl<G: Ord + Clone> MonthlySeries<G> {
    /// All-zero series covering every month of `window`.
    pub fn zeroed(window: &MonthWindow, groups: &[G]) -> Self {
        let zero: BTreeMap<G, u64> = groups.iter().map(|g| (g.clone(), 0)).collect();
        let months = window
            .buckets()
            .into_iter()
            .map(|bucket| MonthlyCounts {
                bucket,
                counts: zero.clone(),
            })
            .collect();

        Self {
            groups: groups.to_vec(),
            months,
        }
    }

    /// Counts for `bucket`, if the series covers it.
    pub fn get(&self, bucket: &MonthBucket) -> Option<&MonthlyCounts<G>> {
        self.months
            .binary_search_by(|m| m.bucket.cmp(bucket))
            .ok()
            .and_then(|i| self.months.get(i))
    }

    /// Sum of `group` over all months.
    pub fn group_total(&self, group: &G) -> u64 {
        self.months.iter().map(|m| m.get(group)).sum()
    }

    /// Sum over all months and groups.
    pub fn total(&self) -> u64 {
        self.months.iter().map(MonthlyCounts::total).sum()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

// ── Totals ────────────────────────────────────────────────────────────────────

/// Grand totals over the whole (possibly restricted) input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub posts: u64,
    pub users: u64,
}

impl Totals {
    /// `(label, count)` rows in table order.
    pub fn rows(&self) -> [(&'static str, u64); 2] {
        [("posts", self.posts), ("users", self.users)]
    }
}

// ── TimecourseAggregator ──────────────────────────────────────────────────────

/// Stateless helper that groups records by calendar month.
pub struct TimecourseAggregator;

impl TimecourseAggregator {
    /// Count `records` per month of `window` and per group.
    ///
    /// Each record lands in the month of its own `timestamp_fn` value;
    /// records whose time falls outside the window are ignored. Records whose
    /// group is not one of `groups` are skipped too, so every month carries
    /// exactly the declared groups (zero when nothing matched).
    pub fn aggregate_monthly<T, G>(
        records: &[T],
        window: &MonthWindow,
        groups: &[G],
        timestamp_fn: impl Fn(&T) -> NaiveDateTime,
        group_fn: impl Fn(&T) -> G,
    ) -> MonthlySeries<G>
    where
        G: Ord + Clone,
    {
        let mut series = MonthlySeries::zeroed(window, groups);
        let mut undeclared = 0usize;

        for record in records {
            let ts = timestamp_fn(record);
            if !window.contains(&ts) {
                continue;
            }
            let slot = window
                .index_of(&MonthBucket::from_datetime(&ts))
                .and_then(|i| series.months.get_mut(i));
            if let Some(month) = slot {
                match month.counts.get_mut(&group_fn(record)) {
                    Some(n) => *n += 1,
                    None => undeclared += 1,
                }
            }
        }

        if undeclared > 0 {
            debug!("Skipped {} records outside the declared groups", undeclared);
        }

        series
    }

    /// Running per-group totals, inclusive of the current month.
    pub fn cumulative<G: Ord + Clone>(series: &MonthlySeries<G>) -> MonthlySeries<G> {
        let mut running: BTreeMap<G, u64> =
            series.groups.iter().map(|g| (g.clone(), 0)).collect();

        let months = series
            .months
            .iter()
            .map(|month| {
                for (group, n) in &month.counts {
                    if let Some(total) = running.get_mut(group) {
                        *total += n;
                    }
                }
                MonthlyCounts {
                    bucket: month.bucket,
                    counts: running.clone(),
                }
            })
            .collect();

        MonthlySeries {
            groups: series.groups.clone(),
            months,
        }
    }

    /// Number of posts and of distinct authors.
    pub fn totals(posts: &[PostRecord]) -> Totals {
        let users: HashSet<&str> = posts.iter().map(|p| p.user_id.as_str()).collect();
        Totals {
            posts: posts.len() as u64,
            users: users.len() as u64,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
