use crate::domain::models::{format_quest_time, parse_quest_time, Quest, QuestCategory, QuestIcon};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::apply_schema;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Storage seam for quest records, keyed by id. `list` returns records in
/// insertion order.
pub trait QuestRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Quest>, InfraError>;
    fn get(&self, quest_id: &str) -> Result<Option<Quest>, InfraError>;
    fn insert(&self, quest: &Quest) -> Result<(), InfraError>;
    /// Returns `false` when no record with `quest.id` exists.
    fn replace(&self, quest: &Quest) -> Result<bool, InfraError>;
    /// Returns `false` when no record with `quest_id` exists.
    fn remove(&self, quest_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryQuestRepository {
    quests: Mutex<Vec<Quest>>,
}

impl InMemoryQuestRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<Quest>>, InfraError> {
        self.quests
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("quest repository: {error}")))
    }
}

impl QuestRepository for InMemoryQuestRepository {
    fn list(&self) -> Result<Vec<Quest>, InfraError> {
        Ok(self.lock()?.clone())
    }

    fn get(&self, quest_id: &str) -> Result<Option<Quest>, InfraError> {
        Ok(self
            .lock()?
            .iter()
            .find(|quest| quest.id == quest_id)
            .cloned())
    }

    fn insert(&self, quest: &Quest) -> Result<(), InfraError> {
        let mut quests = self.lock()?;
        if quests.iter().any(|candidate| candidate.id == quest.id) {
            return Err(InfraError::CorruptRecord(format!(
                "duplicate quest id: {}",
                quest.id
            )));
        }
        quests.push(quest.clone());
        Ok(())
    }

    fn replace(&self, quest: &Quest) -> Result<bool, InfraError> {
        let mut quests = self.lock()?;
        let Some(slot) = quests.iter_mut().find(|candidate| candidate.id == quest.id) else {
            return Ok(false);
        };
        *slot = quest.clone();
        Ok(true)
    }

    fn remove(&self, quest_id: &str) -> Result<bool, InfraError> {
        let mut quests = self.lock()?;
        let before = quests.len();
        quests.retain(|candidate| candidate.id != quest_id);
        Ok(quests.len() != before)
    }
}

#[derive(Debug, Clone)]
pub struct SqliteQuestRepository {
    db_path: PathBuf,
}

type QuestRow = (String, String, String, String, String, bool, String, u32);

const SELECT_COLUMNS: &str =
    "SELECT id, title, category, start_time, end_time, completed, icon, xp FROM quests";

impl SqliteQuestRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        let connection = Connection::open(&self.db_path)?;
        apply_schema(&connection)?;
        Ok(connection)
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn quest_from_row(row: QuestRow) -> Result<Quest, InfraError> {
        let (id, title, category, start_time, end_time, completed, icon, xp) = row;
        let category = QuestCategory::parse(&category).ok_or_else(|| {
            InfraError::CorruptRecord(format!("quest {id} has unknown category '{category}'"))
        })?;
        let icon = QuestIcon::parse(&icon)
            .ok_or_else(|| InfraError::CorruptRecord(format!("quest {id} has unknown icon '{icon}'")))?;
        let start_time = parse_quest_time(&start_time, "quest.start_time")
            .map_err(|error| InfraError::CorruptRecord(format!("quest {id}: {error}")))?;
        let end_time = parse_quest_time(&end_time, "quest.end_time")
            .map_err(|error| InfraError::CorruptRecord(format!("quest {id}: {error}")))?;

        Ok(Quest {
            id,
            title,
            category,
            start_time,
            end_time,
            completed,
            icon,
            xp,
        })
    }
}

impl QuestRepository for SqliteQuestRepository {
    fn list(&self) -> Result<Vec<Quest>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq"))?;
        let rows = statement
            .query_map([], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::quest_from_row).collect()
    }

    fn get(&self, quest_id: &str) -> Result<Option<Quest>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![quest_id],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::quest_from_row).transpose()
    }

    fn insert(&self, quest: &Quest) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO quests (id, title, category, start_time, end_time, completed, icon, xp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                quest.id,
                quest.title,
                quest.category.as_str(),
                format_quest_time(quest.start_time),
                format_quest_time(quest.end_time),
                quest.completed,
                quest.icon.as_str(),
                quest.xp,
            ],
        )?;
        Ok(())
    }

    fn replace(&self, quest: &Quest) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE quests SET
               title = ?2,
               category = ?3,
               start_time = ?4,
               end_time = ?5,
               completed = ?6,
               icon = ?7,
               xp = ?8
             WHERE id = ?1",
            params![
                quest.id,
                quest.title,
                quest.category.as_str(),
                format_quest_time(quest.start_time),
                format_quest_time(quest.end_time),
                quest.completed,
                quest.icon.as_str(),
                quest.xp,
            ],
        )?;
        Ok(changed > 0)
    }

    fn remove(&self, quest_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute("DELETE FROM quests WHERE id = ?1", params![quest_id])?;
        Ok(changed > 0)
    }
}
