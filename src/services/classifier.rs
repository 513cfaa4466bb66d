//! Score → presentation mapping.
//!
//! Two independent views of the same 0-100 score:
//! - [`mood_state`]: discrete buckets with a label, description, emoji and flat color
//! - [`gradient_color`]: continuous RGB interpolation across eleven stops
//!
//! `harvest`-type records use the five-tier [`harvest_level`] table instead.

use std::fmt;

use serde::Serialize;

use crate::models::record::{clamp_score, MoodRecord, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoodState {
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub emoji: &'static str,
}

/// Buckets ordered by ascending lower bound; each covers `[min, next.min)`.
const MOOD_BUCKETS: [(u8, MoodState); 11] = [
    (0, MoodState { label: "🥀绝望 / 崩塌", description: "极度抑郁、毁灭感、无意义、想放弃一切", color: "#212529", emoji: "🥀" }),
    (10, MoodState { label: "😭极度痛苦", description: "痛哭流涕、极度恐惧、心碎、深深的无力感", color: "#495057", emoji: "😭" }),
    (20, MoodState { label: "😖焦虑 / 挣扎", description: "坐立难安、强烈的担忧、自我怀疑、失眠", color: "#868e96", emoji: "😖" }),
    (30, MoodState { label: "😒沮丧 / 烦躁", description: "俗称的“心情不好”、生气、委屈、抱怨等", color: "#ced4da", emoji: "😒" }),
    (40, MoodState { label: "🪫疲惫 / emo", description: "提不起劲、无聊、孤独、淡淡忧伤、不想说话", color: "#a5d8ff", emoji: "🪫" }),
    (50, MoodState { label: "😐平静 / 归零", description: "既不开心也不难过、理智、放空、观察者模式", color: "#4dabf7", emoji: "😐" }),
    (60, MoodState { label: "😌惬意 / 安适", description: "轻松、舒服、小确幸、松弛感", color: "#6bffb8", emoji: "😌" }),
    (70, MoodState { label: "🙂开心 / 愉悦", description: "嘴角上扬、有动力、期待、自信、被认可", color: "#ffd93d", emoji: "🙂" }),
    (80, MoodState { label: "😃兴奋 / 激动", description: "心跳加速、充满干劲、热血沸腾、强烈成就感", color: "#ff6b6b", emoji: "😃" }),
    (90, MoodState { label: "😍狂喜 / 热爱", description: "欢呼雀跃、深深的幸福感、想拥抱全世界", color: "#ff3366", emoji: "😍" }),
    (96, MoodState { label: "🤯巅峰 / 极乐", description: "忘我、天人合一、灵魂升华、极致震撼", color: "#ff00ff", emoji: "🤯" }),
];

pub fn mood_state(score: i64) -> MoodState {
    let score = clamp_score(score);
    let idx = MOOD_BUCKETS.partition_point(|(min, _)| *min <= score);
    // idx >= 1 since the first bucket starts at 0
    MOOD_BUCKETS[idx - 1].1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

const GRADIENT_STOPS: [(u8, Rgb); 11] = [
    (0, Rgb(33, 37, 41)),
    (10, Rgb(73, 80, 87)),
    (20, Rgb(134, 142, 150)),
    (30, Rgb(206, 212, 218)),
    (40, Rgb(165, 216, 255)),
    (50, Rgb(77, 171, 247)),
    (60, Rgb(107, 255, 184)),
    (70, Rgb(255, 217, 61)),
    (80, Rgb(255, 107, 107)),
    (90, Rgb(255, 51, 102)),
    (100, Rgb(255, 0, 255)),
];

pub fn gradient_color(score: i64) -> Rgb {
    let s = clamp_score(score);

    let (lower, upper) = GRADIENT_STOPS
        .windows(2)
        .map(|w| (w[0], w[1]))
        .find(|((lo, _), (hi, _))| s >= *lo && s <= *hi)
        .unwrap_or((GRADIENT_STOPS[10], GRADIENT_STOPS[10]));

    if lower.0 == upper.0 || s == lower.0 {
        return lower.1;
    }

    let t = f64::from(s - lower.0) / f64::from(upper.0 - lower.0);
    let lerp = |a: u8, b: u8| -> u8 {
        (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
    };

    Rgb(
        lerp(lower.1 .0, upper.1 .0),
        lerp(lower.1 .1, upper.1 .1),
        lerp(lower.1 .2, upper.1 .2),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarvestLevel {
    pub min: u8,
    pub max: u8,
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

pub const HARVEST_LEVELS: [HarvestLevel; 5] = [
    HarvestLevel { min: 0, max: 19, label: "😐 普通", description: "平平淡淡才是真，也是一种收获", color: "#9ca3af" },
    HarvestLevel { min: 20, max: 39, label: "😌 精良", description: "小有成就，继续加油", color: "#22c55e" },
    HarvestLevel { min: 40, max: 59, label: "🙂 稀有", description: "难得的际遇，值得铭记", color: "#3b82f6" },
    HarvestLevel { min: 60, max: 79, label: "😃 史诗", description: "升职加薪、考试上岸了！", color: "#a855f7" },
    HarvestLevel { min: 80, max: 100, label: "😍 传说", description: "改变命运的时刻，奇迹发生", color: "#eab308" },
];

pub fn harvest_level(score: i64) -> HarvestLevel {
    let score = clamp_score(score);
    HARVEST_LEVELS
        .iter()
        .copied()
        .find(|level| score >= level.min && score <= level.max)
        .unwrap_or(HARVEST_LEVELS[0])
}

/// Full classification of a single score, as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: RecordType,
    pub score: u8,
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient: Option<String>,
}

pub fn classify(score: i64, kind: RecordType) -> Classification {
    let score = clamp_score(score);
    match kind {
        RecordType::Mood => {
            let state = mood_state(score.into());
            Classification {
                kind,
                score,
                label: state.label,
                description: state.description,
                color: state.color,
                emoji: Some(state.emoji),
                gradient: Some(gradient_color(score.into()).to_string()),
            }
        }
        RecordType::Harvest => {
            let level = harvest_level(score.into());
            Classification {
                kind,
                score,
                label: level.label,
                description: level.description,
                color: level.color,
                emoji: None,
                gradient: None,
            }
        }
    }
}

pub fn classify_record(record: &MoodRecord) -> Classification {
    classify(record.score.into(), record.kind())
}
