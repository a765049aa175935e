//! Novel vs. repeat classification of monthly user activity.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use timecourse_core::models::{Novelty, PostRecord, UserMonthAppearance};
use timecourse_core::month::MonthBucket;

/// Collapse `posts` to one entry per (user, month) and label each entry.
///
/// The representative time of a user-month is its earliest post. Entries are
/// returned in chronological order of that time; a user's first entry is
/// [`Novelty::NovelUser`] and every later one [`Novelty::RepeatUser`].
/// Labels do not depend on the order of `posts`.
pub fn compute_monthly_user_novelty(posts: &[PostRecord]) -> Vec<UserMonthAppearance> {
    let mut index: HashMap<(&str, MonthBucket), usize> = HashMap::new();
    let mut user_months: Vec<(&str, MonthBucket, NaiveDateTime)> = Vec::new();

    for post in posts {
        let key = (post.user_id.as_str(), post.bucket());
        match index.entry(key) {
            Entry::Occupied(slot) => {
                if let Some(entry) = user_months.get_mut(*slot.get()) {
                    entry.2 = entry.2.min(post.timestamp);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(user_months.len());
                user_months.push((key.0, key.1, post.timestamp));
            }
        }
    }

    // Stable: equal times keep first-occurrence order.
    user_months.sort_by_key(|&(_, _, first_seen)| first_seen);

    let mut seen: HashSet<&str> = HashSet::with_capacity(user_months.len());
    user_months
        .into_iter()
        .map(|(user_id, bucket, first_seen)| UserMonthAppearance {
            user_id: user_id.to_string(),
            bucket,
            first_seen,
            novelty: if seen.insert(user_id) {
                Novelty::NovelUser
            } else {
                Novelty::RepeatUser
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn post(user: &str, y: i32, m: u32, d: u32, h: u32) -> PostRecord {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap();
        PostRecord::new(ts, user, None)
    }

    fn bucket(y: i32, m: u32) -> MonthBucket {
        MonthBucket::new(y, m).unwrap()
    }

    fn labels(appearances: &[UserMonthAppearance]) -> Vec<(String, MonthBucket, Novelty)> {
        let mut out: Vec<_> = appearances
            .iter()
            .map(|a| (a.user_id.clone(), a.bucket, a.novelty))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_novelty_two_users_scenario() {
        let posts = vec![
            post("A", 2020, 1, 3, 9),
            post("A", 2020, 1, 20, 9),
            post("A", 2020, 3, 2, 9),
            post("B", 2020, 3, 15, 9),
        ];
        let appearances = compute_monthly_user_novelty(&posts);

        assert_eq!(appearances.len(), 3);
        assert_eq!(
            labels(&appearances),
            vec![
                ("A".to_string(), bucket(2020, 1), Novelty::NovelUser),
                ("A".to_string(), bucket(2020, 3), Novelty::RepeatUser),
                ("B".to_string(), bucket(2020, 3), Novelty::NovelUser),
            ]
        );
    }

    #[test]
    fn test_novelty_result_is_chronological() {
        let posts = vec![
            post("B", 2020, 3, 15, 9),
            post("A", 2020, 3, 2, 9),
            post("A", 2020, 1, 20, 9),
        ];
        let appearances = compute_monthly_user_novelty(&posts);
        let times: Vec<_> = appearances.iter().map(|a| a.first_seen).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_novelty_independent_of_row_order() {
        let posts = vec![
            post("A", 2012, 5, 1, 1),
            post("B", 2012, 5, 2, 1),
            post("A", 2013, 7, 1, 1),
            post("C", 2012, 4, 30, 23),
            post("B", 2012, 6, 1, 1),
            post("C", 2012, 5, 1, 0),
        ];
        let mut reversed = posts.clone();
        reversed.reverse();

        assert_eq!(
            labels(&compute_monthly_user_novelty(&posts)),
            labels(&compute_monthly_user_novelty(&reversed))
        );
    }

    #[test]
    fn test_novelty_widely_separated_months() {
        let posts = vec![post("A", 2019, 8, 1, 12), post("A", 2010, 2, 1, 12)];
        let appearances = compute_monthly_user_novelty(&posts);

        assert_eq!(appearances[0].bucket, bucket(2010, 2));
        assert_eq!(appearances[0].novelty, Novelty::NovelUser);
        assert_eq!(appearances[1].bucket, bucket(2019, 8));
        assert_eq!(appearances[1].novelty, Novelty::RepeatUser);
    }

    #[test]
    fn test_novelty_representative_is_earliest_post_in_month() {
        let posts = vec![
            post("A", 2020, 1, 28, 9),
            post("B", 2020, 1, 10, 9),
            post("A", 2020, 1, 2, 9),
        ];
        let appearances = compute_monthly_user_novelty(&posts);

        assert_eq!(appearances[0].user_id, "A");
        assert_eq!(appearances[0].first_seen.date(), NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(appearances[1].user_id, "B");
    }

    #[test]
    fn test_novelty_exactly_one_novel_per_user() {
        let posts: Vec<PostRecord> = (1..=12)
            .flat_map(|m| vec![post("A", 2015, m, 1, 1), post("B", 2016, m, 5, 1)])
            .collect();
        let appearances = compute_monthly_user_novelty(&posts);

        for user in ["A", "B"] {
            let mine: Vec<_> = appearances.iter().filter(|a| a.user_id == user).collect();
            assert_eq!(mine.len(), 12);
            let novel: Vec<_> = mine
                .iter()
                .filter(|a| a.novelty == Novelty::NovelUser)
                .collect();
            assert_eq!(novel.len(), 1);
            let earliest = mine.iter().map(|a| a.first_seen).min().unwrap();
            assert_eq!(novel[0].first_seen, earliest);
        }
    }

    #[test]
    fn test_novelty_empty_input() {
        assert!(compute_monthly_user_novelty(&[]).is_empty());
    }
}
