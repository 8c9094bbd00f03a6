use super::*;

use std::{
    env, fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn scratch_dir(tag: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("catalog_bot_{tag}_{suffix}"));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn vars(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn defaults_apply_without_file_or_environment() {
    let dir = scratch_dir("defaults");
    let settings = load_settings_from(&dir.join("missing.toml"), vars(&[])).expect("settings");

    assert_eq!(settings.bind_addr, "127.0.0.1:8080");
    assert_eq!(settings.database_url, "sqlite://./data/catalog.db");
    assert_eq!(settings.session_idle_timeout(), Duration::from_secs(900));
    assert_eq!(settings.max_event_bytes, 16 * 1024);
    assert!(settings.admin_ids.is_empty());

    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn environment_overrides_file() {
    let dir = scratch_dir("layers");
    let file = dir.join("bot.toml");
    fs::write(
        &file,
        "bind_addr = \"0.0.0.0:9000\"\nmax_connections = 2\nadmin_ids = [7]\n",
    )
    .expect("write config");

    let from_file = load_settings_from(&file, vars(&[])).expect("settings");
    assert_eq!(from_file.bind_addr, "0.0.0.0:9000");
    assert_eq!(from_file.pool().max_connections, 2);
    assert_eq!(from_file.admins().collect::<Vec<_>>(), vec![Identity(7)]);

    let layered = load_settings_from(
        &file,
        vars(&[
            ("APP__BIND_ADDR", "127.0.0.1:7000"),
            ("APP__ADMIN_IDS", "1,2"),
            ("APP__SESSION_IDLE_TIMEOUT_SECS", "30"),
            ("APP__DATABASE_URL", "./other/catalog.db"),
        ]),
    )
    .expect("settings");
    assert_eq!(layered.bind_addr, "127.0.0.1:7000");
    assert_eq!(layered.admin_ids, vec![1, 2]);
    assert_eq!(layered.session_idle_timeout(), Duration::from_secs(30));
    assert_eq!(layered.database_url, "sqlite://./other/catalog.db");
    assert_eq!(layered.pool().max_connections, 2);

    fs::remove_dir_all(dir).expect("cleanup");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite:./x.db"), "sqlite://./x.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[tokio::test]
async fn normalized_url_opens_a_fresh_sqlite_file() {
    let dir = scratch_dir("open");
    let db_path = dir.join("nested").join("catalog.db");

    let url = normalize_database_url(db_path.to_string_lossy().as_ref());
    let storage = storage::Storage::connect(&url, Settings::default().pool())
        .await
        .expect("open sqlite");
    storage.close().await;

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(dir).expect("cleanup");
}
