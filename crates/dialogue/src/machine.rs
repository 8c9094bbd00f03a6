use std::sync::Arc;

use shared::domain::Identity;
use storage::{CatalogStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::{
    input::Input,
    state::{DialogState, Reply, Session, SessionContext},
    transition::{plan, Applied, CatalogOp, Plan},
};

pub(crate) const GENERIC_FAILURE: &str =
    "Something went wrong while talking to the catalog. Please try again in a moment.";

/// Admin keywords that start (or abort) a flow. Only whole messages count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    AddCommand,
    EditCommand,
    RemoveCommand,
    Cancel,
}

impl Entry {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "/add_command" => Some(Entry::AddCommand),
            "/edit_command" => Some(Entry::EditCommand),
            "/remove_command" => Some(Entry::RemoveCommand),
            "/cancel" => Some(Entry::Cancel),
            _ => None,
        }
    }

    fn first_state(self) -> DialogState {
        match self {
            Entry::AddCommand => DialogState::AwaitingAddChoice,
            Entry::EditCommand => DialogState::AwaitingEditKind,
            Entry::RemoveCommand => DialogState::AwaitingRemoveTarget,
            Entry::Cancel => DialogState::Idle,
        }
    }
}

/// Drives one identity's session through the catalog-editing flows.
///
/// The caller owns the session and must hold it exclusively for the whole
/// call; [`crate::SessionStore::lock`] provides that.
#[derive(Clone)]
pub struct Dialogue {
    store: Arc<dyn CatalogStore>,
}

impl Dialogue {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Starts the flow for `entry`, abandoning whatever was in progress.
    pub fn begin(&self, identity: Identity, session: &mut Session, entry: Entry) -> Reply {
        let was = session.state;
        let had_progress = !was.is_idle() || !session.context.is_empty();
        session.reset();

        if entry == Entry::Cancel {
            if had_progress {
                info!(identity = %identity, from = was.as_str(), "flow cancelled");
                return Reply::text("Cancelled.");
            }
            return Reply::text("Nothing to cancel.");
        }

        if had_progress {
            info!(identity = %identity, from = was.as_str(), "flow abandoned for a new one");
        }
        session.state = entry.first_state();
        debug!(
            identity = %identity,
            from = was.as_str(),
            to = session.state.as_str(),
            "dialog transition"
        );
        session.state.prompt()
    }

    /// Feeds one operator message to a session that is already in a flow.
    pub async fn handle(&self, identity: Identity, session: &mut Session, input: Input) -> Reply {
        let from = session.state;
        let reply = match plan(from, &session.context, &input) {
            Plan::Reprompt { error, reply } => {
                debug!(identity = %identity, state = from.as_str(), %error, "input rejected");
                reply
            }
            Plan::Advance {
                state,
                context,
                reply,
            } => {
                session.state = state;
                session.context = context;
                reply
            }
            Plan::Apply {
                op,
                state,
                context,
                done,
            } => self.execute(identity, session, op, state, context, done).await,
        };

        if session.state != from {
            debug!(
                identity = %identity,
                from = from.as_str(),
                to = session.state.as_str(),
                "dialog transition"
            );
        }
        reply
    }

    async fn execute(
        &self,
        identity: Identity,
        session: &mut Session,
        op: CatalogOp,
        state: DialogState,
        mut context: SessionContext,
        mut done: Reply,
    ) -> Reply {
        let current = session.state;
        match op.apply(self.store.as_ref()).await {
            Ok(applied) => {
                if op.is_mutation() {
                    info!(identity = %identity, op = op.describe(), ?op, "catalog updated by admin");
                }
                match applied {
                    Applied::Created(id) => {
                        if matches!(op, CatalogOp::AddPanel { .. }) {
                            context.panel_id = Some(id);
                        }
                    }
                    Applied::Removed(names) => {
                        // The removed root comes last; everything before it went with it.
                        if let Some((_, descendants)) = names.split_last() {
                            if !descendants.is_empty() {
                                let listed: Vec<String> =
                                    descendants.iter().map(|n| n.marked()).collect();
                                done.text.push_str(&format!(
                                    " Its subcommands were removed too: {}.",
                                    listed.join(", ")
                                ));
                            }
                        }
                    }
                    Applied::Done => {}
                }
                session.state = state;
                session.context = context;
                done
            }
            Err(StoreError::NotFound(name)) => {
                info!(identity = %identity, op = op.describe(), command = %name, "flow aborted: not found");
                session.reset();
                Reply::text(format!("There is no such command: /{name}."))
            }
            Err(err @ (StoreError::DuplicateName(_) | StoreError::Cycle { .. })) => {
                debug!(identity = %identity, op = op.describe(), %err, "store rejected input");
                annotated(current, &format!("Sorry, {err}."))
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(identity = %identity, op = op.describe(), %err, "catalog store unavailable");
                } else {
                    error!(identity = %identity, op = op.describe(), %err, "catalog store failed");
                }
                annotated(current, GENERIC_FAILURE)
            }
        }
    }
}

/// `state`'s prompt, prefixed with `note`. The session is left where it was.
fn annotated(state: DialogState, note: &str) -> Reply {
    let prompt = state.prompt();
    Reply {
        text: format!("{note} {}", prompt.text),
        menu: prompt.menu,
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
