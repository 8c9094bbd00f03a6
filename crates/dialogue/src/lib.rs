//! Conversational editing of the command catalog.
//!
//! Inbound events enter through [`BotRouter::dispatch`]. Ordinary users get
//! read-only catalog lookups; admins are walked through multi-step flows by
//! the per-identity state machine in [`machine`], which plans each step
//! purely ([`transition::plan`]) and then applies the resulting store call.

pub mod admin;
pub mod choice;
pub mod input;
pub mod machine;
pub mod router;
pub mod sessions;
pub mod state;
pub mod transition;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin::AdminGate;
pub use choice::{Choice, ADMIN_PREFIX};
pub use input::{Input, InputError};
pub use machine::{Dialogue, Entry};
pub use router::BotRouter;
pub use sessions::SessionStore;
pub use state::{DialogState, Reply, Session, SessionContext};
