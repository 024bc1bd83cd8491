use crate::application::auth::{AuthManager, SignUpOutcome};
use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::calendar::{CalendarController, DayView};
use crate::application::clock_ticker::ClockTicker;
use crate::application::quest_store::{QuestStore, StoreError};
use crate::application::session::{IdentityProvider, SessionGate};
use crate::domain::clock::{ReferenceClock, TimeTracker};
use crate::domain::layout::QuestSlot;
use crate::domain::models::{Quest, QuestInput, QuestPatch, QuestStats, UserIdentity};
use crate::infrastructure::auth_client::{AuthHttpClient, ReqwestAuthClient};
use crate::infrastructure::config::{AppSettings, AuthSettings, StorageBackend};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::quest_repository::{
    InMemoryQuestRepository, QuestRepository, SqliteQuestRepository,
};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("sign in required")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    settings: AppSettings,
    auth_settings: AuthSettings,
    store: QuestStore,
    clock: ReferenceClock,
    session: Mutex<SessionGate>,
    calendar: Mutex<CalendarController>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::from_bootstrap(bootstrap_workspace(&workspace_root)?)
    }

    /// Builds the state over an already prepared workspace. Demo seeding is
    /// logged here, so install tracing before calling this.
    pub fn from_bootstrap(bootstrap: BootstrapResult) -> Result<Self, InfraError> {
        let settings = bootstrap.settings;
        let repository: Arc<dyn QuestRepository> = match settings.storage {
            StorageBackend::Sqlite => Arc::new(SqliteQuestRepository::new(&bootstrap.database_path)),
            StorageBackend::Memory => Arc::new(InMemoryQuestRepository::default()),
        };
        let store = QuestStore::new(repository)
            .with_productive_day_threshold(settings.productive_day_threshold);
        let clock = ReferenceClock::new(settings.timezone);
        let today = clock.snapshot().today();

        if settings.seed_demo_quests {
            let seeded = store
                .seed_demo_quests(today)
                .map_err(|error| match error {
                    StoreError::Storage(error) => error,
                    other => InfraError::CorruptRecord(format!("demo quests rejected: {other}")),
                })?;
            if seeded > 0 {
                tracing::info!(count = seeded, "seeded demo quests");
            }
        }

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            calendar: Mutex::new(CalendarController::new(settings.grid, today)),
            settings,
            auth_settings: bootstrap.auth,
            store,
            clock,
            session: Mutex::new(SessionGate::SignedOut),
        })
    }

    /// Replaces the reference clock and moves the calendar to its current day.
    pub fn with_clock(mut self, clock: ReferenceClock) -> Self {
        let today = clock.snapshot().today();
        self.calendar = Mutex::new(CalendarController::new(self.settings.grid, today));
        self.clock = clock;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &QuestStore {
        &self.store
    }

    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }

    /// Starts the owned "now" refresher at the configured cadence. The caller
    /// keeps the ticker; dropping it stops the refresh.
    pub fn start_clock_ticker(&self) -> ClockTicker {
        ClockTicker::start(self.clock.clone(), self.settings.clock_refresh)
    }

    pub fn keyring_auth_manager(&self) -> AuthManager<KeyringCredentialStore, ReqwestAuthClient> {
        AuthManager::new(
            self.auth_settings.clone(),
            Arc::new(KeyringCredentialStore::default()),
            Arc::new(ReqwestAuthClient::new()),
        )
    }

    pub fn command_error(&self, command: &str, error: &CommandError) -> String {
        tracing::error!(command, error = %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn session(&self) -> Result<SessionGate, InfraError> {
        Ok(lock(&self.session, "session")?.clone())
    }

    pub fn set_session(&self, gate: SessionGate) -> Result<(), InfraError> {
        *lock(&self.session, "session")? = gate;
        Ok(())
    }

    fn require_user(&self) -> Result<UserIdentity, CommandError> {
        self.session()?
            .user()
            .cloned()
            .ok_or(CommandError::Unauthenticated)
    }

    fn lock_calendar(&self) -> Result<MutexGuard<'_, CalendarController>, InfraError> {
        lock(&self.calendar, "calendar")
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, InfraError> {
    mutex
        .lock()
        .map_err(|error| InfraError::LockPoisoned(format!("{name}: {error}")))
}

pub async fn sign_in<S, C>(
    state: &AppState,
    manager: &AuthManager<S, C>,
    email: String,
    password: String,
) -> Result<SessionGate, CommandError>
where
    S: CredentialStore,
    C: AuthHttpClient,
{
    let session = manager.sign_in_with_password(&email, &password).await?;
    let gate = SessionGate::SignedIn(session.user);
    state.set_session(gate.clone())?;
    state.log_info("sign_in", &format!("signed in user_id={}", gate.user_id().unwrap_or_default()));
    Ok(gate)
}

pub async fn sign_up<S, C>(
    state: &AppState,
    manager: &AuthManager<S, C>,
    email: String,
    password: String,
) -> Result<SignUpOutcome, CommandError>
where
    S: CredentialStore,
    C: AuthHttpClient,
{
    let outcome = manager.sign_up(&email, &password).await?;
    match &outcome {
        SignUpOutcome::SignedIn(session) => {
            state.set_session(SessionGate::SignedIn(session.user.clone()))?;
            state.log_info("sign_up", &format!("signed up user_id={}", session.user.id));
        }
        SignUpOutcome::ConfirmationRequired(user) => {
            state.log_info(
                "sign_up",
                &format!("confirmation pending user_id={}", user.id),
            );
        }
    }
    Ok(outcome)
}

pub async fn restore_session(
    state: &AppState,
    provider: &dyn IdentityProvider,
) -> Result<SessionGate, CommandError> {
    let gate = SessionGate::resolve(provider).await?;
    state.set_session(gate.clone())?;
    state.log_info(
        "restore_session",
        &format!("authenticated={}", gate.is_authenticated()),
    );
    Ok(gate)
}

pub async fn sign_out(state: &AppState, provider: &dyn IdentityProvider) -> Result<(), CommandError> {
    provider.sign_out().await?;
    state.set_session(SessionGate::SignedOut)?;
    state.log_info("sign_out", "signed out");
    Ok(())
}

pub fn greeting(state: &AppState) -> Result<String, CommandError> {
    let gate = state.session()?;
    Ok(gate
        .greeting_name(&state.settings.default_greeting_name)
        .to_string())
}

pub fn create_quest(state: &AppState, input: QuestInput) -> Result<Quest, CommandError> {
    state.require_user()?;
    let quest = state.store.create(input)?;
    state.log_info("create_quest", &format!("created quest_id={}", quest.id));
    Ok(quest)
}

pub fn update_quest(
    state: &AppState,
    quest_id: String,
    patch: QuestPatch,
) -> Result<Quest, CommandError> {
    state.require_user()?;
    let quest = state.store.update(&quest_id, &patch)?;
    state.log_info("update_quest", &format!("updated quest_id={}", quest.id));
    Ok(quest)
}

pub fn toggle_quest(state: &AppState, quest_id: String) -> Result<Quest, CommandError> {
    state.require_user()?;
    let quest = state.store.toggle_completion(&quest_id)?;
    state.log_info(
        "toggle_quest",
        &format!("quest_id={} completed={}", quest.id, quest.completed),
    );
    Ok(quest)
}

/// Clicking a quest block flips its completion.
pub fn quest_clicked(state: &AppState, quest_id: String) -> Result<Quest, CommandError> {
    toggle_quest(state, quest_id)
}

pub fn delete_quest(state: &AppState, quest_id: String) -> Result<(), CommandError> {
    state.require_user()?;
    state.store.delete(&quest_id)?;
    state.log_info("delete_quest", &format!("deleted quest_id={}", quest_id.trim()));
    Ok(())
}

pub fn list_quests(state: &AppState) -> Result<Vec<Quest>, CommandError> {
    state.require_user()?;
    Ok(state.store.list()?)
}

pub fn list_quests_for_day(state: &AppState, date: NaiveDate) -> Result<Vec<Quest>, CommandError> {
    state.require_user()?;
    Ok(state.store.list_for_day(date)?)
}

pub fn quest_stats(state: &AppState) -> Result<QuestStats, CommandError> {
    state.require_user()?;
    Ok(state.store.stats()?)
}

pub fn current_time(state: &AppState) -> TimeTracker {
    state.clock.snapshot()
}

pub fn show_date(state: &AppState, date: NaiveDate) -> Result<DayView, CommandError> {
    state.require_user()?;
    state.lock_calendar()?.show_date(date);
    day_view(state)
}

pub fn show_today(state: &AppState) -> Result<DayView, CommandError> {
    let today = state.clock.snapshot().today();
    show_date(state, today)
}

pub fn day_view(state: &AppState) -> Result<DayView, CommandError> {
    state.require_user()?;
    let tracker = state.clock.snapshot();
    let calendar = state.lock_calendar()?;
    let quests = state.store.list_for_day(calendar.viewed_date())?;
    Ok(calendar.view(&quests, &tracker))
}

pub fn begin_drag(state: &AppState, hour: u32) -> Result<bool, CommandError> {
    state.require_user()?;
    let mut calendar = state.lock_calendar()?;
    let quests = state.store.list_for_day(calendar.viewed_date())?;
    Ok(calendar.begin_drag(&quests, hour))
}

pub fn drag_over_hour(state: &AppState, hour: u32) -> Result<(), CommandError> {
    state.lock_calendar()?.drag_over_hour(hour);
    Ok(())
}

pub fn drag_pointer(state: &AppState, pointer_y: f64) -> Result<(), CommandError> {
    state.lock_calendar()?.drag_pointer(pointer_y);
    Ok(())
}

/// Finishes the drag and hands back the slot for the quest creation form.
pub fn end_drag(state: &AppState) -> Result<Option<QuestSlot>, CommandError> {
    let slot = state.lock_calendar()?.end_drag();
    if let Some(slot) = &slot {
        state.log_info(
            "end_drag",
            &format!("selected slot {} - {}", slot.start_time, slot.end_time),
        );
    }
    Ok(slot)
}

pub fn leave_calendar(state: &AppState) -> Result<(), CommandError> {
    state.lock_calendar()?.leave();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{hour_on, QuestCategory, QuestIcon};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "questlog-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            let instant = DateTime::parse_from_rfc3339("2026-02-16T09:05:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc);
            AppState::new(self.path.clone())
                .expect("initialize app state")
                .with_clock(ReferenceClock::default().with_now_provider(Arc::new(move || instant)))
        }

        fn signed_in_state(&self) -> AppState {
            let state = self.app_state();
            state
                .set_session(SessionGate::SignedIn(arthur()))
                .expect("set session");
            state
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn arthur() -> UserIdentity {
        UserIdentity {
            id: "usr-1".to_string(),
            email: Some("arthur@camelot.io".to_string()),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn input(title: &str, start: u32, end: u32) -> QuestInput {
        QuestInput {
            title: title.to_string(),
            category: QuestCategory::Side,
            start_time: hour_on(day(), start),
            end_time: hour_on(day(), end),
            icon: QuestIcon::Scroll,
            xp: 10,
        }
    }

    struct SignedInProvider {
        signed_out: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for SignedInProvider {
        async fn current_user(&self) -> Result<Option<UserIdentity>, InfraError> {
            Ok(Some(arthur()))
        }

        async fn sign_out(&self) -> Result<(), InfraError> {
            self.signed_out.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn quest_commands_require_sign_in() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(matches!(
            create_quest(&state, input("Study", 11, 12)),
            Err(CommandError::Unauthenticated)
        ));
        assert!(matches!(list_quests(&state), Err(CommandError::Unauthenticated)));
        assert!(matches!(day_view(&state), Err(CommandError::Unauthenticated)));
        assert_eq!(
            greeting(&state).expect("greeting"),
            "King Lawrence of Arya"
        );
    }

    #[test]
    fn create_toggle_and_stats_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();

        let quest = create_quest(&state, input("Study", 11, 12)).expect("create quest");
        create_quest(&state, input("Train", 14, 15)).expect("create quest");
        let clicked = quest_clicked(&state, quest.id.clone()).expect("click quest");
        assert!(clicked.completed);

        let stats = quest_stats(&state).expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.progress_percentage, 50.0);
        assert_eq!(greeting(&state).expect("greeting"), "arthur");
    }

    #[test]
    fn quests_survive_reopening_the_workspace() {
        let workspace = TempWorkspace::new();
        let created = {
            let state = workspace.signed_in_state();
            create_quest(&state, input("Study", 11, 12)).expect("create quest")
        };

        let reopened = workspace.signed_in_state();
        assert_eq!(list_quests(&reopened).expect("list"), vec![created]);
    }

    #[test]
    fn missing_quest_errors_are_reported() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();

        let error = delete_quest(&state, "qst-missing".to_string()).expect_err("missing quest");
        assert!(matches!(
            error,
            CommandError::Store(StoreError::NotFound { .. })
        ));
        assert_eq!(
            state.command_error("delete_quest", &error),
            "Quest not found: qst-missing"
        );
    }

    #[test]
    fn drag_on_calendar_produces_slot_for_free_hours() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        create_quest(&state, input("Study", 11, 12)).expect("create quest");

        assert!(!begin_drag(&state, 11).expect("begin on occupied hour"));
        assert!(begin_drag(&state, 15).expect("begin drag"));
        drag_over_hour(&state, 17).expect("drag");
        let slot = end_drag(&state).expect("end drag").expect("slot");
        assert_eq!(slot.start_time, hour_on(day(), 15));
        assert_eq!(slot.end_time, hour_on(day(), 18));
        assert_eq!(end_drag(&state).expect("second end"), None);
    }

    #[test]
    fn day_view_reports_overdue_quests_for_today() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        let early = create_quest(&state, input("Ritual", 7, 8)).expect("create quest");
        create_quest(&state, input("Study", 11, 12)).expect("create quest");

        let view = day_view(&state).expect("day view");
        assert_eq!(view.date, day());
        assert_eq!(view.overdue_quest_ids, vec![early.id]);

        let tomorrow = show_date(&state, day().succ_opt().expect("next day")).expect("show date");
        assert!(tomorrow.rows.iter().all(|row| !row.occupied));
        assert_eq!(show_today(&state).expect("show today").date, day());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticker_follows_configured_refresh() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path.join("config");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(
            config_dir.join("calendar.json"),
            serde_json::json!({ "schema": 1, "clockRefreshSeconds": 5 }).to_string(),
        )
        .expect("write calendar config");

        let state = workspace.app_state();
        let ticker = state.start_clock_ticker();
        assert_eq!(ticker.period(), std::time::Duration::from_secs(5));
        assert_eq!(ticker.latest(), state.clock().snapshot());

        let mut receiver = ticker.subscribe();
        receiver.mark_unchanged();
        tokio::time::timeout(std::time::Duration::from_secs(6), receiver.changed())
            .await
            .expect("refresh at configured cadence")
            .expect("ticker alive");

        ticker.stop();
    }

    #[test]
    fn demo_quests_are_seeded_when_enabled() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path.join("config");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(
            config_dir.join("app.json"),
            serde_json::json!({ "schema": 1, "seedDemoQuests": true }).to_string(),
        )
        .expect("write app config");

        let state = workspace.signed_in_state();
        assert_eq!(list_quests(&state).expect("list").len(), 4);
        let reopened = workspace.signed_in_state();
        assert_eq!(list_quests(&reopened).expect("list").len(), 4);
    }

    #[tokio::test]
    async fn restore_and_sign_out_update_session_gate() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let provider = SignedInProvider {
            signed_out: AtomicUsize::new(0),
        };

        let gate = restore_session(&state, &provider).await.expect("restore");
        assert!(gate.is_authenticated());
        assert!(list_quests(&state).expect("list").is_empty());

        sign_out(&state, &provider).await.expect("sign out");
        assert_eq!(provider.signed_out.load(Ordering::SeqCst), 1);
        assert_eq!(state.session().expect("session"), SessionGate::SignedOut);
    }
}
