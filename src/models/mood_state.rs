use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::MoodRecord;

pub const DEFAULT_SCORE: u8 = 50;

/// Persisted blob behind the record store: the record list plus the
/// score/baseline fields the home screen reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodState {
    #[serde(default = "default_score")]
    pub current_score: u8,
    #[serde(default)]
    pub today_baseline: Option<u8>,
    #[serde(default)]
    pub last_visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub records: Vec<MoodRecord>,
}

fn default_score() -> u8 {
    DEFAULT_SCORE
}

impl Default for MoodState {
    fn default() -> Self {
        Self {
            current_score: DEFAULT_SCORE,
            today_baseline: None,
            last_visit_date: None,
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodStateView {
    pub current_score: u8,
    pub today_baseline: Option<u8>,
    pub last_visit_date: Option<NaiveDate>,
    pub is_new_day: bool,
}

impl MoodState {
    pub fn view(&self, today: NaiveDate) -> MoodStateView {
        MoodStateView {
            current_score: self.current_score,
            today_baseline: self.today_baseline,
            last_visit_date: self.last_visit_date,
            is_new_day: self.last_visit_date != Some(today),
        }
    }
}
