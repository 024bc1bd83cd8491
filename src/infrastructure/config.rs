use crate::domain::clock::{parse_timezone, DEFAULT_TIMEZONE};
use crate::domain::layout::{CalendarGrid, DEFAULT_MIN_BLOCK_HEIGHT, DEFAULT_PIXELS_PER_HOUR};
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const CALENDAR_JSON: &str = "calendar.json";
const AUTH_JSON: &str = "auth.json";

pub const DEFAULT_GREETING_NAME: &str = "King Lawrence of Arya";
const DEFAULT_PRODUCTIVE_DAY_THRESHOLD: u64 = 3;
const DEFAULT_CLOCK_REFRESH_SECONDS: u64 = 60;
const MAX_CLOCK_REFRESH_SECONDS: u64 = 60;

const AUTH_URL_ENV_KEYS: [&str; 2] = ["QUESTLOG_AUTH_URL", "SUPABASE_URL"];
const AUTH_API_KEY_ENV_KEYS: [&str; 2] = ["QUESTLOG_AUTH_API_KEY", "SUPABASE_ANON_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub app_name: String,
    pub timezone: Tz,
    pub default_greeting_name: String,
    pub productive_day_threshold: usize,
    pub seed_demo_quests: bool,
    pub storage: StorageBackend,
    pub grid: CalendarGrid,
    pub clock_refresh: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "Arya Kingdom".to_string(),
            timezone: DEFAULT_TIMEZONE,
            default_greeting_name: DEFAULT_GREETING_NAME.to_string(),
            productive_day_threshold: DEFAULT_PRODUCTIVE_DAY_THRESHOLD as usize,
            seed_demo_quests: false,
            storage: StorageBackend::Sqlite,
            grid: CalendarGrid::default(),
            clock_refresh: Duration::from_secs(DEFAULT_CLOCK_REFRESH_SECONDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub project_url: String,
    pub api_key: String,
}

impl AuthSettings {
    pub fn is_configured(&self) -> bool {
        !self.project_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Arya Kingdom",
                "timezone": DEFAULT_TIMEZONE.name(),
                "defaultGreetingName": DEFAULT_GREETING_NAME,
                "productiveDayThreshold": DEFAULT_PRODUCTIVE_DAY_THRESHOLD,
                "seedDemoQuests": false,
                "storage": "sqlite"
            }),
        ),
        (
            CALENDAR_JSON,
            serde_json::json!({
                "schema": 1,
                "pixelsPerHour": DEFAULT_PIXELS_PER_HOUR,
                "minBlockHeight": DEFAULT_MIN_BLOCK_HEIGHT,
                "clockRefreshSeconds": DEFAULT_CLOCK_REFRESH_SECONDS
            }),
        ),
        (
            AUTH_JSON,
            serde_json::json!({
                "schema": 1,
                "projectUrl": "",
                "apiKey": ""
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn string_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn load_app_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let calendar = read_config(&config_dir.join(CALENDAR_JSON))?;
    let mut settings = AppSettings::default();

    if let Some(name) = string_field(&app, "appName") {
        settings.app_name = name.to_string();
    }
    if let Some(timezone) = string_field(&app, "timezone") {
        settings.timezone = parse_timezone(timezone).map_err(InfraError::InvalidConfig)?;
    }
    if let Some(greeting) = string_field(&app, "defaultGreetingName") {
        settings.default_greeting_name = greeting.to_string();
    }
    if let Some(threshold) = app
        .get("productiveDayThreshold")
        .and_then(serde_json::Value::as_u64)
    {
        settings.productive_day_threshold = threshold as usize;
    }
    if let Some(seed) = app.get("seedDemoQuests").and_then(serde_json::Value::as_bool) {
        settings.seed_demo_quests = seed;
    }
    if let Some(storage) = string_field(&app, "storage") {
        settings.storage = parse_storage_backend(storage)?;
    }

    if let Some(pixels_per_hour) = calendar
        .get("pixelsPerHour")
        .and_then(serde_json::Value::as_f64)
    {
        settings.grid.pixels_per_hour = pixels_per_hour;
    }
    if let Some(min_block_height) = calendar
        .get("minBlockHeight")
        .and_then(serde_json::Value::as_f64)
    {
        settings.grid.min_block_height = min_block_height;
    }
    settings.grid.validate().map_err(InfraError::InvalidConfig)?;

    if let Some(seconds) = calendar
        .get("clockRefreshSeconds")
        .and_then(serde_json::Value::as_u64)
    {
        settings.clock_refresh = Duration::from_secs(seconds.clamp(1, MAX_CLOCK_REFRESH_SECONDS));
    }

    Ok(settings)
}

pub fn load_auth_settings(config_dir: &Path) -> Result<AuthSettings, InfraError> {
    load_auth_settings_with_lookup(config_dir, |key| std::env::var(key).ok())
}

fn load_auth_settings_with_lookup<F>(config_dir: &Path, lookup: F) -> Result<AuthSettings, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let auth = read_config(&config_dir.join(AUTH_JSON))?;
    let from_env = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| lookup(*key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    };

    let project_url = from_env(&AUTH_URL_ENV_KEYS)
        .or_else(|| string_field(&auth, "projectUrl").map(ToOwned::to_owned))
        .unwrap_or_default();
    let api_key = from_env(&AUTH_API_KEY_ENV_KEYS)
        .or_else(|| string_field(&auth, "apiKey").map(ToOwned::to_owned))
        .unwrap_or_default();

    Ok(AuthSettings {
        project_url: project_url.trim_end_matches('/').to_string(),
        api_key,
    })
}

fn parse_storage_backend(value: &str) -> Result<StorageBackend, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sqlite" => Ok(StorageBackend::Sqlite),
        "memory" | "in_memory" => Ok(StorageBackend::Memory),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported storage backend: {other}"
        ))),
    }
}
