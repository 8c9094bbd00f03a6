use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use thiserror::Error;

use shared::domain::{Command, CommandId, CommandName, Identity, PanelLink};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("command /{0} already exists")]
    DuplicateName(String),
    #[error("no such command: /{0}")]
    NotFound(String),
    #[error("linking /{child} under /{panel} would create a cycle")]
    Cycle { panel: String, child: String },
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("database error: {0}")]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(
            err,
            sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Io(_)
        ) {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Backend(err)
        }
    }
}

impl StoreError {
    /// Connectivity-class failures: the caller may retry the same step later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a panel is addressed when attaching children to it.
#[derive(Debug, Clone, Copy)]
pub enum PanelRef<'a> {
    Id(CommandId),
    Name(&'a CommandName),
}

impl<'a> From<&'a CommandName> for PanelRef<'a> {
    fn from(name: &'a CommandName) -> Self {
        PanelRef::Name(name)
    }
}

impl From<CommandId> for PanelRef<'_> {
    fn from(id: CommandId) -> Self {
        PanelRef::Id(id)
    }
}

/// Durable catalog of commands, panel links and the admin set.
///
/// Every method runs inside its own connection (and transaction where it
/// writes more than one row); nothing is held across calls.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Missing names yield `None`, never an error.
    async fn get_response(&self, name: &CommandName) -> StoreResult<Option<String>>;

    async fn find(&self, name: &CommandName) -> StoreResult<Option<Command>>;

    async fn list_all(&self) -> StoreResult<Vec<Command>>;

    /// Child names in link insertion order; empty for unknown panels.
    async fn children_of(&self, panel: &CommandName) -> StoreResult<Vec<CommandName>>;

    /// Existence lookup returning the row id. Not a panel-ness test.
    async fn panel_id_of(&self, name: &CommandName) -> StoreResult<Option<CommandId>>;

    async fn exists(&self, name: &CommandName) -> StoreResult<bool>;

    async fn has_children(&self, name: &CommandName) -> StoreResult<bool>;

    async fn add_command(&self, name: &CommandName, response: &str) -> StoreResult<CommandId>;

    async fn add_panel(
        &self,
        name: &CommandName,
        response: Option<&str>,
    ) -> StoreResult<CommandId>;

    async fn add_panel_link(&self, panel: PanelRef<'_>, child: &CommandName) -> StoreResult<()>;

    /// `add_command` followed by `add_panel_link`, applied together or not at all.
    async fn add_subcommand(
        &self,
        panel: PanelRef<'_>,
        name: &CommandName,
        response: &str,
    ) -> StoreResult<CommandId>;

    async fn rename(&self, old: &CommandName, new: &CommandName) -> StoreResult<()>;

    async fn set_response(&self, name: &CommandName, response: &str) -> StoreResult<()>;

    /// Removes `name` and its whole descendant subtree. Returns the removed
    /// names, descendants first.
    async fn remove(&self, name: &CommandName) -> StoreResult<Vec<CommandName>>;

    async fn list_links(&self) -> StoreResult<Vec<PanelLink>>;

    /// Returns `false` when the identity was already an admin.
    async fn add_admin(&self, identity: Identity) -> StoreResult<bool>;

    /// Returns `false` when the identity was not an admin.
    async fn remove_admin(&self, identity: Identity) -> StoreResult<bool>;

    async fn list_admins(&self) -> StoreResult<BTreeSet<Identity>>;

    async fn is_admin(&self, identity: Identity) -> StoreResult<bool>;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::connect(database_url, PoolSettings::default()).await
    }

    pub async fn connect(database_url: &str, settings: PoolSettings) -> StoreResult<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CatalogStore for Storage {
    async fn get_response(&self, name: &CommandName) -> StoreResult<Option<String>> {
        let row = sqlx::query("SELECT response FROM commands WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>(0)))
    }

    async fn find(&self, name: &CommandName) -> StoreResult<Option<Command>> {
        let row = sqlx::query("SELECT id, name, response, created_at FROM commands WHERE name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(command_from_row).transpose()
    }

    async fn list_all(&self) -> StoreResult<Vec<Command>> {
        let rows = sqlx::query("SELECT id, name, response, created_at FROM commands ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(command_from_row).collect()
    }

    async fn children_of(&self, panel: &CommandName) -> StoreResult<Vec<CommandName>> {
        let rows = sqlx::query(
            "SELECT c.name
             FROM panel_links l
             JOIN commands p ON p.id = l.panel_id
             JOIN commands c ON c.id = l.child_id
             WHERE p.name = ?
             ORDER BY l.rowid",
        )
        .bind(panel.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| name_from_row(r, 0)).collect()
    }

    async fn panel_id_of(&self, name: &CommandName) -> StoreResult<Option<CommandId>> {
        let mut conn = self.pool.acquire().await?;
        Ok(id_of(&mut conn, name).await?)
    }

    async fn exists(&self, name: &CommandName) -> StoreResult<bool> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM commands WHERE name = ?)")
                .bind(name.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(found != 0)
    }

    async fn has_children(&self, name: &CommandName) -> StoreResult<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM panel_links l
                JOIN commands p ON p.id = l.panel_id
                WHERE p.name = ?
             )",
        )
        .bind(name.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn add_command(&self, name: &CommandName, response: &str) -> StoreResult<CommandId> {
        let mut conn = self.pool.acquire().await?;
        insert_command(&mut conn, name, Some(response)).await
    }

    async fn add_panel(
        &self,
        name: &CommandName,
        response: Option<&str>,
    ) -> StoreResult<CommandId> {
        let mut conn = self.pool.acquire().await?;
        insert_command(&mut conn, name, response).await
    }

    async fn add_panel_link(&self, panel: PanelRef<'_>, child: &CommandName) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let (panel_id, panel_name) = resolve_panel(&mut tx, panel).await?;
        let child_id = id_of(&mut tx, child)
            .await?
            .ok_or_else(|| StoreError::NotFound(child.to_string()))?;
        insert_link(&mut tx, panel_id, &panel_name, child_id, child).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_subcommand(
        &self,
        panel: PanelRef<'_>,
        name: &CommandName,
        response: &str,
    ) -> StoreResult<CommandId> {
        let mut tx = self.pool.begin().await?;
        let (panel_id, panel_name) = resolve_panel(&mut tx, panel).await?;
        let child_id = insert_command(&mut tx, name, Some(response)).await?;
        insert_link(&mut tx, panel_id, &panel_name, child_id, name).await?;
        tx.commit().await?;
        Ok(child_id)
    }

    async fn rename(&self, old: &CommandName, new: &CommandName) -> StoreResult<()> {
        // Links hold ids, so every reference follows the rename in both roles.
        let result = sqlx::query("UPDATE commands SET name = ? WHERE name = ?")
            .bind(new.as_str())
            .bind(old.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, new))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(old.to_string()));
        }
        Ok(())
    }

    async fn set_response(&self, name: &CommandName, response: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE commands SET response = ? WHERE name = ?")
            .bind(response)
            .bind(name.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, name: &CommandName) -> StoreResult<Vec<CommandName>> {
        let mut tx = self.pool.begin().await?;
        let root = id_of(&mut tx, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        // Pre-order walk; reversed below so descendants go before ancestors.
        let mut pending = vec![root];
        let mut seen = HashSet::new();
        let mut subtree = Vec::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            subtree.push(id);
            let children = sqlx::query("SELECT child_id FROM panel_links WHERE panel_id = ?")
                .bind(id.0)
                .fetch_all(&mut *tx)
                .await?;
            pending.extend(children.iter().map(|r| CommandId(r.get::<i64, _>(0))));
        }

        let mut removed = Vec::with_capacity(subtree.len());
        for id in subtree.into_iter().rev() {
            sqlx::query("DELETE FROM panel_links WHERE panel_id = ? OR child_id = ?")
                .bind(id.0)
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
            let row = sqlx::query("DELETE FROM commands WHERE id = ? RETURNING name")
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
            removed.push(name_from_row(&row, 0)?);
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn list_links(&self) -> StoreResult<Vec<PanelLink>> {
        let rows = sqlx::query(
            "SELECT p.name, c.name
             FROM panel_links l
             JOIN commands p ON p.id = l.panel_id
             JOIN commands c ON c.id = l.child_id
             ORDER BY l.rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(PanelLink {
                    panel: name_from_row(r, 0)?,
                    child: name_from_row(r, 1)?,
                })
            })
            .collect()
    }

    async fn add_admin(&self, identity: Identity) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO admins (identity) VALUES (?) ON CONFLICT(identity) DO NOTHING",
        )
        .bind(identity.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_admin(&self, identity: Identity) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM admins WHERE identity = ?")
            .bind(identity.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_admins(&self) -> StoreResult<BTreeSet<Identity>> {
        let rows = sqlx::query("SELECT identity FROM admins")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| Identity(r.get::<i64, _>(0)))
            .collect())
    }

    async fn is_admin(&self, identity: Identity) -> StoreResult<bool> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admins WHERE identity = ?)")
                .bind(identity.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(found != 0)
    }
}

async fn id_of(
    conn: &mut SqliteConnection,
    name: &CommandName,
) -> Result<Option<CommandId>, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM commands WHERE name = ?")
        .bind(name.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| CommandId(r.get::<i64, _>(0))))
}

async fn resolve_panel(
    conn: &mut SqliteConnection,
    panel: PanelRef<'_>,
) -> StoreResult<(CommandId, CommandName)> {
    match panel {
        PanelRef::Name(name) => {
            let id = id_of(conn, name)
                .await?
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            Ok((id, name.clone()))
        }
        PanelRef::Id(id) => {
            let row = sqlx::query("SELECT name FROM commands WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("#{id}")))?;
            Ok((id, name_from_row(&row, 0)?))
        }
    }
}

async fn insert_command(
    conn: &mut SqliteConnection,
    name: &CommandName,
    response: Option<&str>,
) -> StoreResult<CommandId> {
    let rec = sqlx::query("INSERT INTO commands (name, response) VALUES (?, ?) RETURNING id")
        .bind(name.as_str())
        .bind(response)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| conflict_or(e, name))?;
    Ok(CommandId(rec.get::<i64, _>(0)))
}

async fn insert_link(
    conn: &mut SqliteConnection,
    panel_id: CommandId,
    panel_name: &CommandName,
    child_id: CommandId,
    child_name: &CommandName,
) -> StoreResult<()> {
    // The child must not already reach the panel, or the link closes a loop.
    let closes_loop: i64 = sqlx::query_scalar(
        "WITH RECURSIVE subtree(id) AS (
            SELECT ?
            UNION
            SELECT l.child_id FROM panel_links l JOIN subtree s ON l.panel_id = s.id
         )
         SELECT EXISTS(SELECT 1 FROM subtree WHERE id = ?)",
    )
    .bind(child_id.0)
    .bind(panel_id.0)
    .fetch_one(&mut *conn)
    .await?;
    if closes_loop != 0 {
        return Err(StoreError::Cycle {
            panel: panel_name.to_string(),
            child: child_name.to_string(),
        });
    }

    sqlx::query(
        "INSERT INTO panel_links (panel_id, child_id) VALUES (?, ?)
         ON CONFLICT(panel_id, child_id) DO NOTHING",
    )
    .bind(panel_id.0)
    .bind(child_id.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn conflict_or(err: sqlx::Error, name: &CommandName) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateName(name.to_string());
        }
    }
    err.into()
}

fn name_from_row(row: &SqliteRow, idx: usize) -> StoreResult<CommandName> {
    let raw: String = row.try_get(idx)?;
    CommandName::new(raw.clone())
        .map_err(|e| StoreError::InvalidRow(format!("command name {raw:?}: {e}")))
}

fn command_from_row(row: &SqliteRow) -> StoreResult<Command> {
    Ok(Command {
        id: CommandId(row.try_get::<i64, _>("id")?),
        name: name_from_row(row, 1)?,
        response: row.try_get::<Option<String>, _>("response")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> StoreResult<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).map_err(|e| {
        StoreError::Unavailable(format!(
            "failed to create parent directory '{}' for database url '{database_url}': {e}",
            parent.display()
        ))
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
