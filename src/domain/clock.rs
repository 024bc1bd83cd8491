//! Reference-zone clock. All "now", "today" and overdue decisions are made
//! against one configured IANA zone, never the viewer's local zone.

use crate::domain::models::Quest;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn parse_timezone(value: &str) -> Result<Tz, String> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| format!("timezone must be an IANA zone name: {error}"))
}

#[derive(Clone)]
pub struct ReferenceClock {
    timezone: Tz,
    now_provider: NowProvider,
}

impl ReferenceClock {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn snapshot(&self) -> TimeTracker {
        TimeTracker::new((self.now_provider)(), self.timezone)
    }
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

/// A reading of the reference clock. Everything derived from it is a pure
/// function of that single instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTracker {
    now: DateTime<Tz>,
}

impl TimeTracker {
    pub fn new(instant: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            now: instant.with_timezone(&timezone),
        }
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn is_viewing_today(&self, viewed_date: NaiveDate) -> bool {
        viewed_date == self.today()
    }

    pub fn current_time_offset(&self, viewed_date: NaiveDate, pixels_per_hour: f64) -> Option<f64> {
        if !self.is_viewing_today(viewed_date) {
            return None;
        }
        let total_minutes = f64::from(self.now.hour() * 60 + self.now.minute());
        Some(total_minutes / 60.0 * pixels_per_hour)
    }

    pub fn is_overdue(&self, quest: &Quest, viewed_date: NaiveDate) -> bool {
        if quest.completed || !self.is_viewing_today(viewed_date) {
            return false;
        }
        self.now.naive_local() > quest.end_time
    }

    pub fn overdue_quests(&self, quests: &[Quest], viewed_date: NaiveDate) -> Vec<Quest> {
        quests
            .iter()
            .filter(|quest| self.is_overdue(quest, viewed_date))
            .cloned()
            .collect()
    }

    pub fn formatted_current_time(&self) -> String {
        self.now.format("%H:%M").to_string()
    }

    pub fn is_midnight(&self) -> bool {
        self.now.hour() == 0 && self.now.minute() == 0
    }
}
