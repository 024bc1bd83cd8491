use crate::domain::clock::TimeTracker;
use crate::domain::layout::{day_layout, CalendarGrid, DragGesture, DragState, HourRow, QuestSlot};
use crate::domain::models::Quest;
use chrono::NaiveDate;
use serde::Serialize;

/// Everything needed to draw one day of the calendar at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: NaiveDate,
    pub is_today: bool,
    pub formatted_current_time: String,
    pub current_time_offset: Option<f64>,
    pub overdue_quest_ids: Vec<String>,
    pub rows: Vec<HourRow>,
}

/// Per-view state of the day calendar: the viewed date and the in-flight
/// drag, if any.
#[derive(Debug)]
pub struct CalendarController {
    grid: CalendarGrid,
    viewed_date: NaiveDate,
    gesture: DragGesture,
}

impl CalendarController {
    pub fn new(grid: CalendarGrid, viewed_date: NaiveDate) -> Self {
        Self {
            grid,
            viewed_date,
            gesture: DragGesture::default(),
        }
    }

    pub fn viewed_date(&self) -> NaiveDate {
        self.viewed_date
    }

    /// Switching days abandons any drag in progress.
    pub fn show_date(&mut self, date: NaiveDate) {
        self.viewed_date = date;
        self.gesture.leave();
    }

    pub fn drag_state(&self) -> DragState {
        self.gesture.state()
    }

    pub fn begin_drag(&mut self, quests: &[Quest], hour: u32) -> bool {
        self.gesture.begin(quests, self.viewed_date, hour)
    }

    pub fn drag_over_hour(&mut self, hour: u32) {
        self.gesture.update_hour(hour);
    }

    pub fn drag_pointer(&mut self, pointer_y: f64) {
        self.gesture.update_pointer(pointer_y, &self.grid);
    }

    pub fn end_drag(&mut self) -> Option<QuestSlot> {
        self.gesture.end(self.viewed_date)
    }

    pub fn leave(&mut self) {
        self.gesture.leave();
    }

    pub fn view(&self, quests: &[Quest], tracker: &TimeTracker) -> DayView {
        DayView {
            date: self.viewed_date,
            is_today: tracker.is_viewing_today(self.viewed_date),
            formatted_current_time: tracker.formatted_current_time(),
            current_time_offset: tracker
                .current_time_offset(self.viewed_date, self.grid.pixels_per_hour),
            overdue_quest_ids: tracker
                .overdue_quests(quests, self.viewed_date)
                .into_iter()
                .map(|quest| quest.id)
                .collect(),
            rows: day_layout(quests, self.viewed_date, &self.grid),
        }
    }
}
