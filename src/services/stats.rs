use std::collections::BTreeMap;

use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::models::record::MoodRecord;
use crate::services::classifier::mood_state;
use crate::services::weeks::local_date;

/// Inclusive epoch-ms window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    /// Newest first
    #[default]
    Time,
    ScoreDesc,
    ScoreAsc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub label: &'static str,
    pub color: &'static str,
    pub count: usize,
}

fn active(records: &[MoodRecord]) -> impl Iterator<Item = &MoodRecord> {
    records.iter().filter(|r| !r.is_deleted())
}

/// Active records per mood bucket, most frequent first.
pub fn mood_distribution(records: &[MoodRecord], range: Option<TimeRange>) -> Vec<DistributionEntry> {
    let mut counts: BTreeMap<&'static str, DistributionEntry> = BTreeMap::new();

    for record in active(records).filter(|r| range.map_or(true, |rg| rg.contains(r.timestamp))) {
        let state = mood_state(record.score.into());
        counts
            .entry(state.label)
            .or_insert(DistributionEntry {
                label: state.label,
                color: state.color,
                count: 0,
            })
            .count += 1;
    }

    let mut entries: Vec<DistributionEntry> = counts.into_values().collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// Start of the local day seven days before `now`.
pub fn default_window_start(now: i64, offset: FixedOffset) -> i64 {
    local_date(now, offset)
        .map(|today| today - Duration::days(7))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|dt| offset.from_local_datetime(&dt).single())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(now - 7 * 86_400_000)
}

/// Active records inside `range` (default: since the start of the day a week
/// ago), ordered by `sort`. Score ties fall back to newest first.
pub fn records_in_range(
    records: &[MoodRecord],
    range: Option<TimeRange>,
    sort: SortType,
    now: i64,
    offset: FixedOffset,
) -> Vec<MoodRecord> {
    let mut filtered: Vec<MoodRecord> = match range {
        Some(rg) => active(records).filter(|r| rg.contains(r.timestamp)).cloned().collect(),
        None => {
            let since = default_window_start(now, offset);
            active(records).filter(|r| r.timestamp > since).cloned().collect()
        }
    };

    filtered.sort_by(|a, b| match sort {
        SortType::Time => b.timestamp.cmp(&a.timestamp),
        SortType::ScoreDesc => b.score.cmp(&a.score).then(b.timestamp.cmp(&a.timestamp)),
        SortType::ScoreAsc => a.score.cmp(&b.score).then(b.timestamp.cmp(&a.timestamp)),
    });
    filtered
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub average_score: f64,
    pub records: Vec<MoodRecord>,
}

/// Active records grouped by local calendar day, oldest day first.
pub fn daily_summaries(records: &[MoodRecord], offset: FixedOffset) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, Vec<MoodRecord>> = BTreeMap::new();
    for record in active(records) {
        if let Some(date) = local_date(record.timestamp, offset) {
            days.entry(date).or_default().push(record.clone());
        }
    }

    days.into_iter()
        .map(|(date, mut records)| {
            records.sort_by_key(|r| r.timestamp);
            let total: u32 = records.iter().map(|r| u32::from(r.score)).sum();
            DailySummary {
                date,
                average_score: f64::from(total) / records.len() as f64,
                records,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400_000;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn rec(id: &str, timestamp: i64, score: i64) -> MoodRecord {
        MoodRecord::new(id.into(), timestamp, score, String::new(), None)
    }

    #[test]
    fn test_distribution_skips_trashed_and_sorts_by_count() {
        let mut trashed = rec("t", 10, 72);
        trashed.deleted_at = Some(11);
        let records = vec![rec("a", 1, 72), rec("b", 2, 75), rec("c", 3, 20), trashed];

        let dist = mood_distribution(&records, None);
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].label, "🙂开心 / 愉悦");
        assert_eq!(dist[0].count, 2);
        assert_eq!(dist[1].count, 1);
    }

    #[test]
    fn test_distribution_honors_range() {
        let records = vec![rec("a", 100, 72), rec("b", 5_000, 20)];
        let dist = mood_distribution(&records, Some(TimeRange { start: 0, end: 1_000 }));
        assert_eq!(dist.len(), 1);
        assert_eq!(dist[0].count, 1);
    }

    #[test]
    fn test_records_in_range_defaults_to_last_week() {
        let now = 20 * DAY + 12 * 3_600_000; // midday on day 20
        let records = vec![
            rec("old", 12 * DAY, 50),
            rec("edge", 13 * DAY + 1, 50),
            rec("new", 19 * DAY, 50),
        ];
        let ids: Vec<String> = records_in_range(&records, None, SortType::Time, now, utc())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "edge"]);
    }

    #[test]
    fn test_score_sort_breaks_ties_by_newest() {
        let records = vec![rec("a", 1, 60), rec("b", 2, 60), rec("c", 3, 90), rec("d", 4, 10)];
        let range = Some(TimeRange { start: 0, end: 10 });

        let desc: Vec<String> = records_in_range(&records, range, SortType::ScoreDesc, 0, utc())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(desc, vec!["c", "b", "a", "d"]);

        let asc: Vec<String> = records_in_range(&records, range, SortType::ScoreAsc, 0, utc())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(asc, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_daily_summaries_group_by_local_day() {
        let records = vec![rec("a", DAY + 1_000, 40), rec("b", DAY + 2_000, 80), rec("c", 3 * DAY, 10)];
        let summaries = daily_summaries(&records, utc());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].date, NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
        assert_eq!(summaries[0].average_score, 60.0);
        assert_eq!(summaries[0].records.len(), 2);

        // Shifting the offset moves a late-evening record to the next day
        let plus_one = FixedOffset::east_opt(23 * 3600).unwrap();
        let summaries = daily_summaries(&[rec("x", DAY + 3_600_000, 50)], plus_one);
        assert_eq!(summaries[0].date, NaiveDate::from_ymd_opt(1970, 1, 3).unwrap());
    }
}
