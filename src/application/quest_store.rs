use crate::domain::models::{
    day_start, demo_quests, progress_percentage, Quest, QuestInput, QuestPatch, QuestStats,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::quest_repository::QuestRepository;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

const DEFAULT_PRODUCTIVE_DAY_THRESHOLD: usize = 3;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_quest_id() -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("qst-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Quest not found: {id}")]
    NotFound { id: String },
    #[error(transparent)]
    Storage(#[from] InfraError),
}

/// Single owner of the quest collection. Mutations are serialized so no
/// caller observes a half-applied read-modify-write; aggregates are always
/// derived from the repository contents, never cached.
pub struct QuestStore {
    repository: Arc<dyn QuestRepository>,
    write_guard: Mutex<()>,
    productive_day_threshold: usize,
}

impl QuestStore {
    pub fn new(repository: Arc<dyn QuestRepository>) -> Self {
        Self {
            repository,
            write_guard: Mutex::new(()),
            productive_day_threshold: DEFAULT_PRODUCTIVE_DAY_THRESHOLD,
        }
    }

    pub fn with_productive_day_threshold(mut self, threshold: usize) -> Self {
        self.productive_day_threshold = threshold;
        self
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_guard.lock().map_err(|error| {
            StoreError::Storage(InfraError::LockPoisoned(format!("quest store: {error}")))
        })
    }

    pub fn create(&self, input: QuestInput) -> Result<Quest, StoreError> {
        input.validate().map_err(StoreError::Validation)?;
        let quest = input.into_quest(next_quest_id());

        let _guard = self.lock_writes()?;
        self.repository.insert(&quest)?;
        Ok(quest)
    }

    pub fn update(&self, quest_id: &str, patch: &QuestPatch) -> Result<Quest, StoreError> {
        let _guard = self.lock_writes()?;
        let current = self.require(quest_id)?;
        if patch.is_empty() {
            return Ok(current);
        }

        let merged = patch.apply_to(&current);
        merged.validate().map_err(StoreError::Validation)?;
        self.replace(merged)
    }

    pub fn toggle_completion(&self, quest_id: &str) -> Result<Quest, StoreError> {
        let _guard = self.lock_writes()?;
        let mut quest = self.require(quest_id)?;
        quest.completed = !quest.completed;
        self.replace(quest)
    }

    pub fn delete(&self, quest_id: &str) -> Result<(), StoreError> {
        let _guard = self.lock_writes()?;
        if !self.repository.remove(quest_id.trim())? {
            return Err(StoreError::NotFound {
                id: quest_id.trim().to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, quest_id: &str) -> Result<Quest, StoreError> {
        self.require(quest_id)
    }

    pub fn list(&self) -> Result<Vec<Quest>, StoreError> {
        Ok(self.repository.list()?)
    }

    /// Quests touching the given day, earliest start first.
    pub fn list_for_day(&self, date: NaiveDate) -> Result<Vec<Quest>, StoreError> {
        let day_begin = day_start(date);
        let day_end = day_begin + Duration::days(1);
        let mut quests = self
            .list()?
            .into_iter()
            .filter(|quest| quest.overlaps(day_begin, day_end))
            .collect::<Vec<_>>();
        quests.sort_by(|left, right| left.start_time.cmp(&right.start_time));
        Ok(quests)
    }

    pub fn total_count(&self) -> Result<usize, StoreError> {
        Ok(self.list()?.len())
    }

    pub fn completed_count(&self) -> Result<usize, StoreError> {
        Ok(self.list()?.iter().filter(|quest| quest.completed).count())
    }

    pub fn progress_percentage(&self) -> Result<f64, StoreError> {
        let quests = self.list()?;
        let completed = quests.iter().filter(|quest| quest.completed).count();
        Ok(progress_percentage(completed, quests.len()))
    }

    pub fn stats(&self) -> Result<QuestStats, StoreError> {
        Ok(QuestStats::from_quests(
            &self.list()?,
            self.productive_day_threshold,
        ))
    }

    /// Fills an empty store with the sample quests; returns how many were added.
    pub fn seed_demo_quests(&self, date: NaiveDate) -> Result<usize, StoreError> {
        if !self.list()?.is_empty() {
            return Ok(0);
        }
        let samples = demo_quests(date);
        let count = samples.len();
        for input in samples {
            self.create(input)?;
        }
        Ok(count)
    }

    fn require(&self, quest_id: &str) -> Result<Quest, StoreError> {
        let quest_id = quest_id.trim();
        self.repository
            .get(quest_id)?
            .ok_or_else(|| StoreError::NotFound {
                id: quest_id.to_string(),
            })
    }

    fn replace(&self, quest: Quest) -> Result<Quest, StoreError> {
        if !self.repository.replace(&quest)? {
            return Err(StoreError::NotFound { id: quest.id });
        }
        Ok(quest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{hour_on, QuestCategory, QuestIcon};
    use crate::infrastructure::quest_repository::InMemoryQuestRepository;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn store() -> QuestStore {
        QuestStore::new(Arc::new(InMemoryQuestRepository::default()))
    }

    fn input(title: &str, start: u32, end: u32) -> QuestInput {
        QuestInput {
            title: title.to_string(),
            category: QuestCategory::Main,
            start_time: hour_on(day(), start),
            end_time: hour_on(day(), end),
            icon: QuestIcon::Sword,
            xp: 25,
        }
    }

    #[test]
    fn create_assigns_unique_ids_and_defaults() {
        let store = store();
        let first = store.create(input("Strategy", 9, 11)).expect("create");
        let second = store.create(input("Training", 14, 15)).expect("create");
        assert_ne!(first.id, second.id);
        assert!(!first.completed);
        assert_eq!(
            store.list().expect("list"),
            vec![first, second]
        );
    }

    #[test]
    fn create_rejects_invalid_interval_without_changing_store() {
        let store = store();
        let result = store.create(input("Backwards", 11, 9));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        let result = store.create(input("Empty", 9, 9));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.total_count().expect("count"), 0);
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let store = store();
        let kept = store.create(input("Strategy", 9, 11)).expect("create");

        assert!(matches!(
            store.update("missing", &QuestPatch::default()),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.toggle_completion("missing"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.delete("missing"), Err(StoreError::NotFound { .. })));
        assert_eq!(store.list().expect("list"), vec![kept]);
    }

    #[test]
    fn deleting_twice_is_an_error() {
        let store = store();
        let quest = store.create(input("Strategy", 9, 11)).expect("create");
        store.delete(&quest.id).expect("delete");
        match store.delete(&quest.id) {
            Err(StoreError::NotFound { id }) => assert_eq!(id, quest.id),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn toggle_twice_restores_completion() {
        let store = store();
        let quest = store.create(input("Strategy", 9, 11)).expect("create");
        assert!(store.toggle_completion(&quest.id).expect("toggle").completed);
        assert!(!store.toggle_completion(&quest.id).expect("toggle").completed);
    }

    #[test]
    fn update_merges_and_revalidates() {
        let store = store();
        let quest = store.create(input("Strategy", 9, 11)).expect("create");

        let updated = store
            .update(
                &quest.id,
                &QuestPatch {
                    title: Some("Evening Strategy".to_string()),
                    end_time: Some(hour_on(day(), 12)),
                    ..QuestPatch::default()
                },
            )
            .expect("update");
        assert_eq!(updated.title, "Evening Strategy");
        assert_eq!(updated.end_time, hour_on(day(), 12));
        assert_eq!(updated.xp, quest.xp);

        let rejected = store.update(
            &quest.id,
            &QuestPatch {
                start_time: Some(hour_on(day(), 13)),
                ..QuestPatch::default()
            },
        );
        assert!(matches!(rejected, Err(StoreError::Validation(_))));
        assert_eq!(store.get(&quest.id).expect("get"), updated);
    }

    #[test]
    fn aggregates_follow_collection() {
        let store = store();
        assert_eq!(store.progress_percentage().expect("progress"), 0.0);

        let first = store.create(input("Strategy", 9, 11)).expect("create");
        store.create(input("Training", 14, 15)).expect("create");
        store.toggle_completion(&first.id).expect("toggle");

        assert_eq!(store.total_count().expect("total"), 2);
        assert_eq!(store.completed_count().expect("completed"), 1);
        assert_eq!(store.progress_percentage().expect("progress"), 50.0);
        let stats = store.stats().expect("stats");
        assert_eq!(stats.earned_xp, 25);
        assert!(!stats.is_productive_day);
    }

    #[test]
    fn list_for_day_sorts_by_start() {
        let store = store();
        store.create(input("Late", 14, 15)).expect("create");
        store.create(input("Early", 7, 8)).expect("create");
        let mut other_day = input("Tomorrow", 9, 10);
        other_day.start_time += Duration::days(1);
        other_day.end_time += Duration::days(1);
        store.create(other_day).expect("create");

        let titles = store
            .list_for_day(day())
            .expect("list for day")
            .into_iter()
            .map(|quest| quest.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Early".to_string(), "Late".to_string()]);
    }

    #[test]
    fn demo_seed_only_fills_empty_store() {
        let store = store();
        assert_eq!(store.seed_demo_quests(day()).expect("seed"), 4);
        assert_eq!(store.seed_demo_quests(day()).expect("seed again"), 0);
        assert_eq!(store.total_count().expect("count"), 4);
    }

    #[derive(Debug, Clone)]
    enum Operation {
        Create { start: u32, length: u32 },
        Toggle(usize),
        Update { index: usize, completed: bool },
        Delete(usize),
        DeleteMissing,
    }

    fn operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            (0u32..23, 1u32..4).prop_map(|(start, length)| Operation::Create { start, length }),
            (0usize..16).prop_map(Operation::Toggle),
            (0usize..16, any::<bool>())
                .prop_map(|(index, completed)| Operation::Update { index, completed }),
            (0usize..16).prop_map(Operation::Delete),
            Just(Operation::DeleteMissing),
        ]
    }

    proptest! {
        #[test]
        fn aggregates_stay_consistent_for_any_operation_sequence(
            operations in prop::collection::vec(operation(), 0..40)
        ) {
            let store = store();
            let mut seen_ids = HashSet::new();

            for operation in operations {
                let ids = store
                    .list()
                    .expect("list")
                    .into_iter()
                    .map(|quest| quest.id)
                    .collect::<Vec<_>>();
                match operation {
                    Operation::Create { start, length } => {
                        let quest = store
                            .create(input("Generated", start, start + length))
                            .expect("create");
                        prop_assert!(seen_ids.insert(quest.id));
                    }
                    Operation::Toggle(index) if !ids.is_empty() => {
                        store.toggle_completion(&ids[index % ids.len()]).expect("toggle");
                    }
                    Operation::Update { index, completed } if !ids.is_empty() => {
                        let patch = QuestPatch {
                            completed: Some(completed),
                            ..QuestPatch::default()
                        };
                        store.update(&ids[index % ids.len()], &patch).expect("update");
                    }
                    Operation::Delete(index) if !ids.is_empty() => {
                        store.delete(&ids[index % ids.len()]).expect("delete");
                    }
                    _ => {
                        let before = store.list().expect("list");
                        prop_assert!(store.delete("qst-missing").is_err());
                        prop_assert_eq!(store.list().expect("list"), before);
                    }
                }

                let quests = store.list().expect("list");
                let stats = store.stats().expect("stats");
                prop_assert_eq!(stats.total, quests.len());
                prop_assert_eq!(
                    stats.completed,
                    quests.iter().filter(|quest| quest.completed).count()
                );
                prop_assert!((0.0..=100.0).contains(&stats.progress_percentage));
                if stats.total == 0 {
                    prop_assert_eq!(stats.progress_percentage, 0.0);
                }
            }
        }
    }
}
