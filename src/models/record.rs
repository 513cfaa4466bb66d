use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 100;

/// Clamp any incoming score into `0..=100`.
pub fn clamp_score(score: i64) -> u8 {
    score.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8
}

/// Accepts any JSON number, fractional or huge, and clamps it.
pub fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_score(raw.round() as i64))
}

pub fn deserialize_optional_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(|score| clamp_score(score.round() as i64)))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[default]
    Mood,
    Harvest,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mood => "mood",
            Self::Harvest => "harvest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mood" => Some(Self::Mood),
            "harvest" => Some(Self::Harvest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodRecord {
    pub id: String,
    /// Creation instant in epoch milliseconds.
    pub timestamp: i64,
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    /// Set while the record sits in the trash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl MoodRecord {
    pub fn new(
        id: String,
        timestamp: i64,
        score: i64,
        note: String,
        record_type: Option<RecordType>,
    ) -> Self {
        Self {
            id,
            timestamp,
            score: clamp_score(score),
            note,
            record_type,
            deleted_at: None,
        }
    }

    pub fn kind(&self) -> RecordType {
        self.record_type.unwrap_or_default()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Document shape in the remote collection. `user_id` and `create_time`
/// only exist on the wire, never on the local record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(flatten)]
    pub record: MoodRecord,
    pub user_id: String,
    pub create_time: String,
}

/// Partial update mirrored to the remote collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub note: Option<String>,
    pub score: Option<u8>,
    /// `Some(None)` clears the deletion mark, `None` leaves it alone.
    pub deleted_at: Option<Option<i64>>,
}

impl RecordPatch {
    pub fn edit(note: String, score: Option<u8>) -> Self {
        Self {
            note: Some(note),
            score,
            deleted_at: None,
        }
    }

    pub fn trash(at: i64) -> Self {
        Self {
            deleted_at: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn restore() -> Self {
        Self {
            deleted_at: Some(None),
            ..Default::default()
        }
    }

    pub fn apply(&self, record: &mut MoodRecord) {
        if let Some(note) = &self.note {
            record.note = note.clone();
        }
        if let Some(score) = self.score {
            record.score = score;
        }
        if let Some(deleted_at) = self.deleted_at {
            record.deleted_at = deleted_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(0), 0);
        assert_eq!(clamp_score(72), 72);
        assert_eq!(clamp_score(100), 100);
        assert_eq!(clamp_score(250), 100);
    }

    #[test]
    fn test_record_deserializes_without_optional_fields() {
        let json = r#"{"id":"a","timestamp":1700000000000,"score":64,"note":"ok"}"#;
        let record: MoodRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind(), RecordType::Mood);
        assert!(!record.is_deleted());
        assert_eq!(record.score, 64);
    }

    #[test]
    fn test_record_clamps_out_of_range_scores_on_read() {
        let json = r#"{"id":"a","timestamp":1,"score":180.0,"note":""}"#;
        let record: MoodRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.score, 100);
    }

    #[test]
    fn test_record_serializes_type_and_deleted_at_in_camel_case() {
        let mut record = MoodRecord::new("a".into(), 1, 80, "won".into(), Some(RecordType::Harvest));
        record.deleted_at = Some(5);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "harvest");
        assert_eq!(json["deletedAt"], 5);
        assert!(json.get("record_type").is_none());
    }

    #[test]
    fn test_remote_record_flattens_with_user_fields() {
        let doc = RemoteRecord {
            record: MoodRecord::new("a".into(), 1, 50, "".into(), None),
            user_id: "me@example.com".into(),
            create_time: "2026-01-01 08:00:00".into(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["userId"], "me@example.com");
        assert_eq!(json["createTime"], "2026-01-01 08:00:00");
        assert!(json.get("type").is_none());
    }

    #[test]
    fn test_patch_apply_restore_clears_deleted_at() {
        let mut record = MoodRecord::new("a".into(), 1, 50, "".into(), None);
        RecordPatch::trash(10).apply(&mut record);
        assert_eq!(record.deleted_at, Some(10));
        RecordPatch::restore().apply(&mut record);
        assert_eq!(record.deleted_at, None);
        RecordPatch::edit("new".into(), Some(90)).apply(&mut record);
        assert_eq!(record.note, "new");
        assert_eq!(record.score, 90);
    }
}
