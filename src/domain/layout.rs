//! Day-view calendar geometry: which quests occupy which hour rows, where
//! their blocks sit, and how a pointer drag turns into a new quest slot.
//!
//! A quest's block is rendered once, anchored at its starting hour. Occupancy
//! is computed for every hour the quest overlaps, so the middle of a long
//! quest still refuses new drags.

use crate::domain::models::{hour_on, Quest};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: u32 = 24;
pub const LAST_HOUR: u32 = HOURS_PER_DAY - 1;
pub const DEFAULT_PIXELS_PER_HOUR: f64 = 40.0;
pub const DEFAULT_MIN_BLOCK_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarGrid {
    pub pixels_per_hour: f64,
    pub min_block_height: f64,
}

impl Default for CalendarGrid {
    fn default() -> Self {
        Self {
            pixels_per_hour: DEFAULT_PIXELS_PER_HOUR,
            min_block_height: DEFAULT_MIN_BLOCK_HEIGHT,
        }
    }
}

impl CalendarGrid {
    pub fn validate(&self) -> Result<(), String> {
        if !self.pixels_per_hour.is_finite() || self.pixels_per_hour <= 0.0 {
            return Err("calendar.pixels_per_hour must be > 0".to_string());
        }
        if !self.min_block_height.is_finite() || self.min_block_height < 0.0 {
            return Err("calendar.min_block_height must be >= 0".to_string());
        }
        Ok(())
    }

    fn span_height(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        let seconds = (end - start).num_seconds().max(0) as f64;
        seconds / 3600.0 * self.pixels_per_hour
    }

    fn clamp_visible(&self, height: f64) -> f64 {
        height.max(self.min_block_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockGeometry {
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Start,
    Interior,
    End,
}

/// The slice of a quest that falls inside a single hour row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourSegment {
    pub kind: SegmentKind,
    pub geometry: BlockGeometry,
}

/// The block drawn for a quest, anchored at its starting hour row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestBlock {
    pub quest_id: String,
    pub start_hour: u32,
    pub span_hours: u32,
    pub geometry: BlockGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourRow {
    pub hour: u32,
    pub label: String,
    pub occupied: bool,
    pub occupant_ids: Vec<String>,
    pub blocks: Vec<QuestBlock>,
}

pub fn hour_window(viewed_date: NaiveDate, hour: u32) -> (NaiveDateTime, NaiveDateTime) {
    (hour_on(viewed_date, hour), hour_on(viewed_date, hour + 1))
}

pub fn quests_intersecting_hour<'a>(
    quests: &'a [Quest],
    viewed_date: NaiveDate,
    hour: u32,
) -> Vec<&'a Quest> {
    if hour > LAST_HOUR {
        return Vec::new();
    }
    let (hour_start, hour_end) = hour_window(viewed_date, hour);
    quests
        .iter()
        .filter(|quest| quest.overlaps(hour_start, hour_end))
        .collect()
}

pub fn is_hour_occupied(quests: &[Quest], viewed_date: NaiveDate, hour: u32) -> bool {
    !quests_intersecting_hour(quests, viewed_date, hour).is_empty()
}

pub fn block_geometry(
    quest: &Quest,
    viewed_date: NaiveDate,
    hour: u32,
    grid: &CalendarGrid,
) -> Option<HourSegment> {
    if hour > LAST_HOUR {
        return None;
    }
    let (hour_start, hour_end) = hour_window(viewed_date, hour);
    if !quest.overlaps(hour_start, hour_end) {
        return None;
    }

    let starts_here = quest.start_time >= hour_start;
    let ends_here = quest.end_time <= hour_end;
    let segment = if starts_here {
        HourSegment {
            kind: SegmentKind::Start,
            geometry: BlockGeometry {
                top: grid.span_height(hour_start, quest.start_time),
                height: grid.clamp_visible(
                    grid.span_height(quest.start_time, quest.end_time.min(hour_end)),
                ),
            },
        }
    } else if ends_here {
        HourSegment {
            kind: SegmentKind::End,
            geometry: BlockGeometry {
                top: 0.0,
                height: grid.clamp_visible(grid.span_height(hour_start, quest.end_time)),
            },
        }
    } else {
        HourSegment {
            kind: SegmentKind::Interior,
            geometry: BlockGeometry {
                top: 0.0,
                height: grid.pixels_per_hour,
            },
        }
    };
    Some(segment)
}

/// `None` when the quest does not start on the viewed date.
pub fn rendered_block(quest: &Quest, viewed_date: NaiveDate, grid: &CalendarGrid) -> Option<QuestBlock> {
    if quest.start_time.date() != viewed_date {
        return None;
    }
    let start_hour = quest.start_time.hour();
    let end_hour = if quest.end_time.date() > viewed_date {
        HOURS_PER_DAY
    } else {
        quest.end_time.hour()
    };
    let span_hours = end_hour.saturating_sub(start_hour).max(1);

    Some(QuestBlock {
        quest_id: quest.id.clone(),
        start_hour,
        span_hours,
        geometry: BlockGeometry {
            top: f64::from(quest.start_time.minute()) / 60.0 * grid.pixels_per_hour,
            height: f64::from(span_hours) * grid.pixels_per_hour,
        },
    })
}

pub fn day_layout(quests: &[Quest], viewed_date: NaiveDate, grid: &CalendarGrid) -> Vec<HourRow> {
    (0..HOURS_PER_DAY)
        .map(|hour| {
            let occupant_ids = quests_intersecting_hour(quests, viewed_date, hour)
                .into_iter()
                .map(|quest| quest.id.clone())
                .collect::<Vec<_>>();
            let blocks = quests
                .iter()
                .filter_map(|quest| rendered_block(quest, viewed_date, grid))
                .filter(|block| block.start_hour == hour)
                .collect::<Vec<_>>();
            HourRow {
                hour,
                label: hour_label(hour),
                occupied: !occupant_ids.is_empty(),
                occupant_ids,
                blocks,
            }
        })
        .collect()
}

pub fn hour_label(hour: u32) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour {
        0 => 12,
        1..=12 => hour,
        _ => hour - 12,
    };
    format!("{display_hour}:00 {period}")
}

/// Hour row under a vertical pointer offset, clamped to the grid.
pub fn hour_at_offset(pointer_y: f64, pixels_per_hour: f64) -> u32 {
    if !pointer_y.is_finite() || !pixels_per_hour.is_finite() || pixels_per_hour <= 0.0 {
        return 0;
    }
    let hour = (pointer_y / pixels_per_hour).floor();
    hour.clamp(0.0, f64::from(LAST_HOUR)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        start_hour: u32,
        end_hour: u32,
    },
}

/// Candidate interval for a new quest produced by a completed drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestSlot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Debug, Default)]
pub struct DragGesture {
    state: DragState,
}

impl DragGesture {
    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Returns `false` and leaves the gesture untouched when the hour is
    /// outside the grid or already occupied.
    pub fn begin(&mut self, quests: &[Quest], viewed_date: NaiveDate, hour: u32) -> bool {
        if hour > LAST_HOUR || is_hour_occupied(quests, viewed_date, hour) {
            return false;
        }
        self.state = DragState::Dragging {
            start_hour: hour,
            end_hour: hour,
        };
        true
    }

    pub fn update_hour(&mut self, hour: u32) {
        if let DragState::Dragging { end_hour, .. } = &mut self.state {
            *end_hour = hour.min(LAST_HOUR);
        }
    }

    pub fn update_pointer(&mut self, pointer_y: f64, grid: &CalendarGrid) {
        self.update_hour(hour_at_offset(pointer_y, grid.pixels_per_hour));
    }

    pub fn end(&mut self, viewed_date: NaiveDate) -> Option<QuestSlot> {
        let DragState::Dragging {
            start_hour,
            end_hour,
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };
        let first = start_hour.min(end_hour);
        let last = start_hour.max(end_hour) + 1;
        Some(QuestSlot {
            start_time: hour_on(viewed_date, first),
            end_time: hour_on(viewed_date, last),
        })
    }

    pub fn leave(&mut self) {
        self.state = DragState::Idle;
    }
}
