//! Calendar-year → Monday-start weeks, bucketed into quarters.
//!
//! Weeks follow the `eachWeekOfInterval` decomposition: the first week starts on the
//! Monday on or before Jan 1 and weeks continue while their Monday is on or before
//! Dec 31. A week lands in the quarter holding its Thursday. Only the month is
//! compared, so a leading week whose Thursday is still in December sits in Q4.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, TimeZone};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    /// `"{year}-{week_number}"`
    pub id: String,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub week_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterInfo {
    pub id: u8,
    pub label: &'static str,
    pub weeks: Vec<WeekInfo>,
}

const QUARTER_LABELS: [&str; 4] = ["1-3月", "4-6月", "7-9月", "10-12月"];

pub fn find_monday(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_monday(); // Mon=0
    date - Duration::days(weekday as i64)
}

/// Quarter index (0-3) of the month holding the week's Thursday.
fn quarter_of_week(start: NaiveDate) -> usize {
    let thursday = start + Duration::days(3);
    (thursday.month0() / 3) as usize
}

pub fn quarter_weeks(year: i32) -> Vec<QuarterInfo> {
    let mut quarters: Vec<QuarterInfo> = QUARTER_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| QuarterInfo {
            id: i as u8 + 1,
            label: *label,
            weeks: Vec::new(),
        })
        .collect();

    let (Some(first_day), Some(last_day)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return quarters;
    };

    let mut start = find_monday(first_day);
    let mut week_number = 1u32;
    while start <= last_day {
        let end = start + Duration::days(6);
        quarters[quarter_of_week(start)].weeks.push(WeekInfo {
            id: format!("{}-{}", year, week_number),
            label: format!(
                "第{}周 ({}.{}-{}.{})",
                week_number,
                start.month(),
                start.day(),
                end.month(),
                end.day()
            ),
            start,
            end,
            week_number,
        });
        start += Duration::days(7);
        week_number += 1;
    }

    quarters
}

impl WeekInfo {
    /// Inclusive instant range in epoch ms: Monday 00:00:00.000 through
    /// Sunday 23:59:59.999 in `offset`.
    pub fn bounds_millis(&self, offset: FixedOffset) -> Option<(i64, i64)> {
        let start = offset
            .from_local_datetime(&self.start.and_hms_opt(0, 0, 0)?)
            .single()?;
        let next = offset
            .from_local_datetime(&(self.end + Duration::days(1)).and_hms_opt(0, 0, 0)?)
            .single()?;
        Some((start.timestamp_millis(), next.timestamp_millis() - 1))
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Local calendar date of an epoch-ms instant.
pub fn local_date(timestamp_ms: i64, offset: FixedOffset) -> Option<NaiveDate> {
    offset
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive())
}

/// The week of `year` holding the instant, if any.
pub fn week_containing(year: i32, timestamp_ms: i64, offset: FixedOffset) -> Option<WeekInfo> {
    let date = local_date(timestamp_ms, offset)?;
    quarter_weeks(year)
        .into_iter()
        .flat_map(|q| q.weeks)
        .find(|w| w.contains_date(date))
}
