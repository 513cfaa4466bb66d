use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::store::local::{load_json, save_json, LocalStorage, StorageError, REPORTS_STORAGE_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub year: i32,
    pub week: u32,
    pub content: String,
}

fn report_key(year: i32, week: u32) -> String {
    format!("{}-{}", year, week)
}

fn parse_key(key: &str) -> Option<(i32, u32)> {
    // Years may be negative in theory, so split on the last dash
    let (year, week) = key.rsplit_once('-')?;
    Some((year.parse().ok()?, week.parse().ok()?))
}

/// Weekly AI reports keyed by `"{year}-{week}"`.
pub struct ReportCache {
    storage: Arc<dyn LocalStorage>,
    reports: RwLock<HashMap<String, String>>,
}

impl ReportCache {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        let reports: HashMap<String, String> = load_json(storage.as_ref(), REPORTS_STORAGE_KEY);
        Self {
            storage,
            reports: RwLock::new(reports),
        }
    }

    pub async fn get(&self, year: i32, week: u32) -> Option<String> {
        self.reports.read().await.get(&report_key(year, week)).cloned()
    }

    /// Stores a report, replacing any previous one for the same week.
    pub async fn save(&self, year: i32, week: u32, content: String) -> Result<(), StorageError> {
        let mut reports = self.reports.write().await;
        let mut next = reports.clone();
        next.insert(report_key(year, week), content);
        save_json(self.storage.as_ref(), REPORTS_STORAGE_KEY, &next)?;
        *reports = next;
        Ok(())
    }

    /// Returns whether a report was removed.
    pub async fn delete(&self, year: i32, week: u32) -> Result<bool, StorageError> {
        let mut reports = self.reports.write().await;
        let mut next = reports.clone();
        if next.remove(&report_key(year, week)).is_none() {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), REPORTS_STORAGE_KEY, &next)?;
        *reports = next;
        Ok(true)
    }

    /// Newest week first.
    pub async fn list(&self) -> Vec<ReportEntry> {
        let reports = self.reports.read().await;
        let mut entries: Vec<ReportEntry> = reports
            .iter()
            .filter_map(|(key, content)| {
                let (year, week) = parse_key(key)?;
                Some(ReportEntry {
                    year,
                    week,
                    content: content.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| (b.year, b.week).cmp(&(a.year, a.week)));
        entries
    }
}
