use std::sync::Arc;

use shared::domain::Identity;
use storage::{CatalogStore, StoreResult};
use tracing::warn;

use crate::choice::ADMIN_PREFIX;

/// Decides whether an identity may run catalog-mutating actions.
#[derive(Clone)]
pub struct AdminGate {
    store: Arc<dyn CatalogStore>,
}

impl AdminGate {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// `callback_payload` is the opaque token of a menu selection, if the
    /// action came from one. Such actions must also carry the admin prefix,
    /// whoever sends them.
    pub async fn is_authorized(
        &self,
        identity: Identity,
        callback_payload: Option<&str>,
    ) -> StoreResult<bool> {
        if let Some(payload) = callback_payload {
            if !payload.starts_with(ADMIN_PREFIX) {
                warn!(identity = %identity, payload, "privileged callback without admin prefix");
                return Ok(false);
            }
        }
        self.store.is_admin(identity).await
    }

    pub async fn is_admin(&self, identity: Identity) -> StoreResult<bool> {
        self.store.is_admin(identity).await
    }
}
