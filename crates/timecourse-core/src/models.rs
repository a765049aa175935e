use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TimecourseError;
use crate::month::MonthBucket;

// ── Lucidity ──────────────────────────────────────────────────────────────────

/// Lucidity label attached to a dream journal post.
///
/// Variant order is the presentation (stacking) order used by every series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lucidity {
    /// The author did not tag the post.
    Unspecified,
    /// The author tagged the post both lucid and non-lucid.
    Ambiguous,
    Nonlucid,
    Lucid,
}

impl Lucidity {
    /// The full label vocabulary, in presentation order.
    pub const ALL: [Lucidity; 4] = [
        Lucidity::Unspecified,
        Lucidity::Ambiguous,
        Lucidity::Nonlucid,
        Lucidity::Lucid,
    ];

    /// The non-ambiguous vocabulary kept in restrict mode.
    pub const RESTRICTED: [Lucidity; 2] = [Lucidity::Nonlucid, Lucidity::Lucid];

    /// Machine label as it appears in the posts table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lucidity::Unspecified => "unspecified",
            Lucidity::Ambiguous => "ambiguous",
            Lucidity::Nonlucid => "nonlucid",
            Lucidity::Lucid => "lucid",
        }
    }

    /// Human-readable label for figure legends.
    pub fn legend_label(&self) -> &'static str {
        match self {
            Lucidity::Unspecified => "unspecified",
            Lucidity::Ambiguous => "ambiguous (both)",
            Lucidity::Nonlucid => "non-lucid",
            Lucidity::Lucid => "lucid",
        }
    }

    /// Whether this label survives restrict mode.
    pub fn is_restricted(&self) -> bool {
        Self::RESTRICTED.contains(self)
    }
}

impl fmt::Display for Lucidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lucidity {
    type Err = TimecourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unspecified" => Ok(Lucidity::Unspecified),
            "ambiguous" => Ok(Lucidity::Ambiguous),
            "nonlucid" => Ok(Lucidity::Nonlucid),
            "lucid" => Ok(Lucidity::Lucid),
            _ => Err(TimecourseError::UnknownLabel(s.to_string())),
        }
    }
}

// ── Novelty ───────────────────────────────────────────────────────────────────

/// Whether a user-month is the user's first month of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Novelty {
    #[serde(rename = "repeat-user")]
    RepeatUser,
    #[serde(rename = "novel-user")]
    NovelUser,
}

impl Novelty {
    /// Both labels, in presentation (stacking) order.
    pub const ALL: [Novelty; 2] = [Novelty::RepeatUser, Novelty::NovelUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Novelty::RepeatUser => "repeat-user",
            Novelty::NovelUser => "novel-user",
        }
    }

    pub fn legend_label(&self) -> &'static str {
        match self {
            Novelty::RepeatUser => "repeat",
            Novelty::NovelUser => "novel",
        }
    }
}

impl fmt::Display for Novelty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── PostRecord ────────────────────────────────────────────────────────────────

/// One forum post as read from the posts table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Timezone-naive posting time.
    pub timestamp: NaiveDateTime,
    /// Author identifier, stable across a user's posts.
    pub user_id: String,
    /// `None` when the lucidity cell was empty.
    pub lucidity: Option<Lucidity>,
}

impl PostRecord {
    pub fn new(timestamp: NaiveDateTime, user_id: impl Into<String>, lucidity: Option<Lucidity>) -> Self {
        Self {
            timestamp,
            user_id: user_id.into(),
            lucidity,
        }
    }

    pub fn bucket(&self) -> MonthBucket {
        MonthBucket::from_datetime(&self.timestamp)
    }

    /// Group used for post counts; an untagged post counts as unspecified.
    pub fn lucidity_group(&self) -> Lucidity {
        self.lucidity.unwrap_or(Lucidity::Unspecified)
    }
}

// ── UserMonthAppearance ───────────────────────────────────────────────────────

/// One distinct (user, month) pair with its novelty classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMonthAppearance {
    pub user_id: String,
    pub bucket: MonthBucket,
    /// Earliest post time of this user within `bucket`.
    pub first_seen: NaiveDateTime,
    pub novelty: Novelty,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
