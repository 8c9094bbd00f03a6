use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::Identity;
use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tracing::{debug, info};

#[cfg(test)]
use crate::state::DialogState;
use crate::state::Session;

type SessionSlot = Arc<AsyncMutex<Session>>;

/// Per-identity conversation sessions.
///
/// Each identity gets its own async mutex, so duplicate deliveries for one
/// identity run one after another while different identities never wait on
/// each other. The outer map lock is only held to look up or insert a slot.
pub struct SessionStore {
    slots: Mutex<HashMap<Identity, SessionSlot>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Exclusive access to `identity`'s session for the duration of one event.
    ///
    /// A session left idle past the timeout is reset before it is returned.
    pub async fn lock(&self, identity: Identity) -> OwnedMutexGuard<Session> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(identity).or_default())
        };
        let mut session = slot.lock_owned().await;
        if !session.state.is_idle() && session.is_stale(self.idle_timeout) {
            info!(
                identity = %identity,
                state = session.state.as_str(),
                "session expired, resetting"
            );
            session.reset();
        }
        session.touch();
        session
    }

    /// Current state without creating a session. `None` if the session is
    /// absent or busy with another event.
    #[cfg(test)]
    pub(crate) fn peek(&self, identity: Identity) -> Option<DialogState> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.get(&identity)?)
        };
        let session = slot.try_lock().ok()?;
        Some(session.state)
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&identity)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops idle or expired sessions that nobody is using. Returns how many
    /// were dropped.
    pub fn sweep(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|identity, slot| {
            // Any other handle means an event holds the slot or is about to
            // lock it; dropping it would orphan that session.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let Ok(session) = slot.try_lock() else {
                return true;
            };
            let expired = session.is_stale(self.idle_timeout);
            if expired && !session.state.is_idle() {
                info!(
                    identity = %identity,
                    state = session.state.as_str(),
                    "evicting abandoned session"
                );
            }
            !(expired || (session.state.is_idle() && session.context.is_empty()))
        });
        let dropped = before - slots.len();
        if dropped > 0 {
            debug!(dropped, remaining = slots.len(), "session sweep");
        }
        dropped
    }

    /// Runs [`SessionStore::sweep`] every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep();
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/sessions_tests.rs"]
mod tests;
