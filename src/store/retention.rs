//! Retention policy — which stored results survive a cleanup pass.

use chrono::{DateTime, Duration, Utc};

use super::ResultRecord;

/// Age and count bounds applied on every commit and on manual cleanup.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Maximum number of records kept.
    pub max_count: usize,
    /// Maximum record age in days.
    pub max_age_days: i64,
}

impl RetentionPolicy {
    pub fn new(max_count: usize, max_age_days: i64) -> Self {
        Self {
            max_count,
            max_age_days,
        }
    }

    /// Partition `records` into (kept, pruned) as of `now`.
    ///
    /// Kept are the most recent `max_count` records that are also within
    /// the age window; a record failing either bound is pruned. Pure —
    /// file deletion is the store's business.
    pub fn partition(
        &self,
        mut records: Vec<ResultRecord>,
        now: DateTime<Utc>,
    ) -> (Vec<ResultRecord>, Vec<ResultRecord>) {
        let cutoff = now - Duration::days(self.max_age_days);

        // Whole-log sort, newest first; the log stays small enough that
        // re-sorting beats maintaining an index.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut kept = Vec::new();
        let mut pruned = Vec::new();
        for record in records {
            if record.created_at >= cutoff && kept.len() < self.max_count {
                kept.push(record);
            } else {
                pruned.push(record);
            }
        }
        (kept, pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(age_days: i64, now: DateTime<Utc>) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            filename: format!("{age_days}.png"),
            prompt: "p".to_string(),
            negative_prompt: None,
            width: 64,
            height: 64,
            steps: 4,
            use_gpu: false,
            seed: 0,
            size_bytes: 1,
            created_at: now - Duration::days(age_days),
            elapsed_ms: None,
        }
    }

    #[test]
    fn count_bound_keeps_most_recent() {
        let now = Utc::now();
        let records = vec![record(3, now), record(1, now), record(2, now)];
        let policy = RetentionPolicy::new(2, 30);
        let (kept, pruned) = policy.partition(records, now);

        assert_eq!(kept.len(), 2);
        assert_eq!(pruned.len(), 1);
        // Newest first, oldest pruned.
        assert_eq!(kept[0].filename, "1.png");
        assert_eq!(kept[1].filename, "2.png");
        assert_eq!(pruned[0].filename, "3.png");
    }

    #[test]
    fn age_bound_prunes_even_under_count() {
        let now = Utc::now();
        let records = vec![record(40, now), record(1, now)];
        let policy = RetentionPolicy::new(500, 30);
        let (kept, pruned) = policy.partition(records, now);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filename, "1.png");
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].filename, "40.png");
    }

    #[test]
    fn everything_within_bounds_is_kept() {
        let now = Utc::now();
        let records = vec![record(0, now), record(5, now), record(29, now)];
        let policy = RetentionPolicy::new(500, 30);
        let (kept, pruned) = policy.partition(records, now);
        assert_eq!(kept.len(), 3);
        assert!(pruned.is_empty());
    }

    #[test]
    fn empty_log_is_a_noop() {
        let policy = RetentionPolicy::new(2, 30);
        let (kept, pruned) = policy.partition(Vec::new(), Utc::now());
        assert!(kept.is_empty());
        assert!(pruned.is_empty());
    }
}
