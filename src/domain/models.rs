use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const QUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const PROGRESS_MILESTONES: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestCategory {
    Main,
    Side,
    Ritual,
}

impl QuestCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Side => "side",
            Self::Ritual => "ritual",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Main => "Main Quest",
            Self::Side => "Side Quest",
            Self::Ritual => "Royal Ritual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" | "main quest" => Some(Self::Main),
            "side" | "side quest" => Some(Self::Side),
            "ritual" | "royal ritual" => Some(Self::Ritual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestIcon {
    Sword,
    Shield,
    Scroll,
    Crown,
    Clock,
    Zap,
    Sparkles,
}

impl QuestIcon {
    const ALL: [QuestIcon; 7] = [
        Self::Sword,
        Self::Shield,
        Self::Scroll,
        Self::Crown,
        Self::Clock,
        Self::Zap,
        Self::Sparkles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sword => "sword",
            Self::Shield => "shield",
            Self::Scroll => "scroll",
            Self::Crown => "crown",
            Self::Clock => "clock",
            Self::Zap => "zap",
            Self::Sparkles => "sparkles",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|icon| icon.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub category: QuestCategory,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub completed: bool,
    pub icon: QuestIcon,
    pub xp: u32,
}

impl Quest {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "quest.id")?;
        validate_non_empty(&self.title, "quest.title")?;
        validate_interval(self.start_time, self.end_time, "quest")?;
        if self.xp == 0 {
            return Err("quest.xp must be > 0".to_string());
        }
        Ok(())
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// Fields supplied by the caller when creating a quest; the store assigns
/// `id` and `completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestInput {
    pub title: String,
    pub category: QuestCategory,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub icon: QuestIcon,
    pub xp: u32,
}

impl QuestInput {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "quest.title")?;
        validate_interval(self.start_time, self.end_time, "quest")?;
        if self.xp == 0 {
            return Err("quest.xp must be > 0".to_string());
        }
        Ok(())
    }

    pub fn into_quest(self, id: String) -> Quest {
        Quest {
            id,
            title: self.title.trim().to_string(),
            category: self.category,
            start_time: self.start_time,
            end_time: self.end_time,
            completed: false,
            icon: self.icon,
            xp: self.xp,
        }
    }
}

/// Partial update. `xp` is fixed at creation and has no slot here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestPatch {
    pub title: Option<String>,
    pub category: Option<QuestCategory>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub completed: Option<bool>,
    pub icon: Option<QuestIcon>,
}

impl QuestPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.completed.is_none()
            && self.icon.is_none()
    }

    pub fn touches_interval(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    pub fn apply_to(&self, quest: &Quest) -> Quest {
        let mut merged = quest.clone();
        if let Some(title) = &self.title {
            merged.title = title.trim().to_string();
        }
        if let Some(category) = self.category {
            merged.category = category;
        }
        if let Some(start_time) = self.start_time {
            merged.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            merged.end_time = end_time;
        }
        if let Some(completed) = self.completed {
            merged.completed = completed;
        }
        if let Some(icon) = self.icon {
            merged.icon = icon;
        }
        merged
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestStats {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub progress_percentage: f64,
    pub rounded_progress: u8,
    pub earned_xp: u64,
    pub is_productive_day: bool,
    pub milestones_reached: Vec<u8>,
}

impl QuestStats {
    pub fn from_quests(quests: &[Quest], productive_day_threshold: usize) -> Self {
        let total = quests.len();
        let completed = quests.iter().filter(|quest| quest.completed).count();
        let progress_percentage = progress_percentage(completed, total);
        let earned_xp = quests
            .iter()
            .filter(|quest| quest.completed)
            .map(|quest| u64::from(quest.xp))
            .sum();

        Self {
            total,
            completed,
            remaining: total - completed,
            progress_percentage,
            rounded_progress: progress_percentage.round() as u8,
            earned_xp,
            is_productive_day: completed >= productive_day_threshold,
            milestones_reached: PROGRESS_MILESTONES
                .into_iter()
                .filter(|milestone| f64::from(*milestone) <= progress_percentage)
                .collect(),
        }
    }
}

pub fn progress_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * completed as f64 / total as f64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

impl UserIdentity {
    /// Local part of the e-mail address, if there is a usable one.
    pub fn greeting_name(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub user: UserIdentity,
}

impl AuthSession {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// `hour` may be 24, which lands on the following midnight.
pub fn hour_on(date: NaiveDate, hour: u32) -> NaiveDateTime {
    day_start(date) + Duration::hours(i64::from(hour))
}

/// Sample quests shown on a fresh quest log.
pub fn demo_quests(date: NaiveDate) -> Vec<QuestInput> {
    let quest = |title: &str, category, start: u32, end: u32, icon, xp| QuestInput {
        title: title.to_string(),
        category,
        start_time: hour_on(date, start),
        end_time: hour_on(date, end),
        icon,
        xp,
    };

    vec![
        quest(
            "Morning Kingdom Strategy",
            QuestCategory::Main,
            9,
            11,
            QuestIcon::Sword,
            25,
        ),
        quest(
            "Royal Training Session",
            QuestCategory::Main,
            14,
            15,
            QuestIcon::Shield,
            15,
        ),
        quest(
            "Ancient Text Study",
            QuestCategory::Side,
            11,
            12,
            QuestIcon::Scroll,
            10,
        ),
        quest(
            "Meditation Ritual",
            QuestCategory::Ritual,
            7,
            8,
            QuestIcon::Sparkles,
            15,
        ),
    ]
}

pub fn format_quest_time(value: NaiveDateTime) -> String {
    value.format(QUEST_TIME_FORMAT).to_string()
}

pub fn parse_quest_time(value: &str, field_name: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value.trim(), QUEST_TIME_FORMAT)
        .map_err(|_| format!("{field_name} must be YYYY-MM-DDTHH:MM:SS"))
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_interval(
    start: NaiveDateTime,
    end: NaiveDateTime,
    field_prefix: &str,
) -> Result<(), String> {
    if end <= start {
        return Err(format!(
            "{field_prefix}.end_time must be after {field_prefix}.start_time"
        ));
    }
    Ok(())
}
