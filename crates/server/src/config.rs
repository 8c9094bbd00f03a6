use std::{path::Path, time::Duration};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use shared::domain::Identity;
use storage::PoolSettings;

pub const CONFIG_FILE: &str = "bot.toml";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub session_idle_timeout_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub admin_ids: Vec<i64>,
    pub max_event_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/catalog.db".into(),
            max_connections: 5,
            acquire_timeout_secs: 5,
            session_idle_timeout_secs: 900,
            session_sweep_interval_secs: 60,
            admin_ids: Vec::new(),
            max_event_bytes: 16 * 1024,
        }
    }
}

impl Settings {
    pub fn pool(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections.max(1),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }

    pub fn admins(&self) -> impl Iterator<Item = Identity> + '_ {
        self.admin_ids.iter().copied().map(Identity)
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(CONFIG_FILE), None)
}

/// Defaults, then `file` if present, then `APP__*` variables. `env` replaces
/// the process environment when given.
pub fn load_settings_from(
    file: &Path,
    env: Option<config::Map<String, String>>,
) -> anyhow::Result<Settings> {
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("admin_ids")
        .try_parsing(true)
        .source(env);

    let settings: Settings = Config::builder()
        .add_source(File::from(file).required(false))
        .add_source(environment)
        .build()
        .context("failed to build configuration")?
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    Ok(Settings {
        database_url: normalize_database_url(&settings.database_url),
        ..settings
    })
}

/// Turns plain paths into `sqlite:` URLs, leaving real URLs alone.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if is_windows_drive_path(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        if is_windows_drive_path(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    let path = raw_database_url.replace('\\', "/");
    if is_windows_drive_path(&path) {
        return format!("sqlite:{path}");
    }
    format!("sqlite://{path}")
}

fn is_windows_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
