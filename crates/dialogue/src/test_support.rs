use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::domain::{Command, CommandId, CommandName, Identity, PanelLink};
use storage::{CatalogStore, PanelRef, Storage, StoreError, StoreResult};
use tokio::time::Duration;

use crate::{router::BotRouter, sessions::SessionStore};

pub const ADMIN: Identity = Identity(1);
pub const OTHER_ADMIN: Identity = Identity(2);
pub const USER: Identity = Identity(100);

pub fn name(raw: &str) -> CommandName {
    CommandName::new(raw).expect("valid name")
}

/// In-memory store with [`ADMIN`] and [`OTHER_ADMIN`] registered.
pub async fn admin_storage() -> Storage {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.add_admin(ADMIN).await.expect("admin");
    storage.add_admin(OTHER_ADMIN).await.expect("admin");
    storage
}

pub fn router(store: Arc<dyn CatalogStore>) -> BotRouter {
    BotRouter::new(store, Arc::new(SessionStore::new(Duration::from_secs(900))))
}

/// Store wrapper whose every call fails as unavailable while `down` is set.
pub struct FlakyStore {
    inner: Storage,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Storage) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn get_response(&self, name: &CommandName) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.get_response(name).await
    }

    async fn find(&self, name: &CommandName) -> StoreResult<Option<Command>> {
        self.check()?;
        self.inner.find(name).await
    }

    async fn list_all(&self) -> StoreResult<Vec<Command>> {
        self.check()?;
        self.inner.list_all().await
    }

    async fn children_of(&self, panel: &CommandName) -> StoreResult<Vec<CommandName>> {
        self.check()?;
        self.inner.children_of(panel).await
    }

    async fn panel_id_of(&self, name: &CommandName) -> StoreResult<Option<CommandId>> {
        self.check()?;
        self.inner.panel_id_of(name).await
    }

    async fn exists(&self, name: &CommandName) -> StoreResult<bool> {
        self.check()?;
        self.inner.exists(name).await
    }

    async fn has_children(&self, name: &CommandName) -> StoreResult<bool> {
        self.check()?;
        self.inner.has_children(name).await
    }

    async fn add_command(&self, name: &CommandName, response: &str) -> StoreResult<CommandId> {
        self.check()?;
        self.inner.add_command(name, response).await
    }

    async fn add_panel(
        &self,
        name: &CommandName,
        response: Option<&str>,
    ) -> StoreResult<CommandId> {
        self.check()?;
        self.inner.add_panel(name, response).await
    }

    async fn add_panel_link(&self, panel: PanelRef<'_>, child: &CommandName) -> StoreResult<()> {
        self.check()?;
        self.inner.add_panel_link(panel, child).await
    }

    async fn add_subcommand(
        &self,
        panel: PanelRef<'_>,
        name: &CommandName,
        response: &str,
    ) -> StoreResult<CommandId> {
        self.check()?;
        self.inner.add_subcommand(panel, name, response).await
    }

    async fn rename(&self, old: &CommandName, new: &CommandName) -> StoreResult<()> {
        self.check()?;
        self.inner.rename(old, new).await
    }

    async fn set_response(&self, name: &CommandName, response: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.set_response(name, response).await
    }

    async fn remove(&self, name: &CommandName) -> StoreResult<Vec<CommandName>> {
        self.check()?;
        self.inner.remove(name).await
    }

    async fn list_links(&self) -> StoreResult<Vec<PanelLink>> {
        self.check()?;
        self.inner.list_links().await
    }

    async fn add_admin(&self, identity: Identity) -> StoreResult<bool> {
        self.check()?;
        self.inner.add_admin(identity).await
    }

    async fn remove_admin(&self, identity: Identity) -> StoreResult<bool> {
        self.check()?;
        self.inner.remove_admin(identity).await
    }

    async fn list_admins(&self) -> StoreResult<BTreeSet<Identity>> {
        self.check()?;
        self.inner.list_admins().await
    }

    async fn is_admin(&self, identity: Identity) -> StoreResult<bool> {
        self.check()?;
        self.inner.is_admin(identity).await
    }
}
