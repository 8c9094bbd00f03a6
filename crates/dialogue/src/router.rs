use std::sync::Arc;

use shared::{
    domain::{CommandName, Identity, NAME_MARKER},
    protocol::{EventKind, InboundEvent, MenuButton, OutboundAction},
};
use storage::{CatalogStore, StoreResult};
use tracing::{error, info, warn};

use crate::{
    admin::AdminGate,
    choice::ADMIN_PREFIX,
    input::Input,
    machine::{Dialogue, Entry, GENERIC_FAILURE},
    sessions::SessionStore,
    state::Reply,
};

const START: &str = "start";
const HELP: &str = "help";
const NOT_UNDERSTOOD: &str = "Sorry, I can't understand you! I was made only for functioning by commands. Send /help to see available ones.";
const ADMINS_ONLY: &str = "Sorry, this action is available to admins only.";

/// Entry point for every inbound event.
///
/// Admin traffic goes to the per-identity [`Dialogue`]; everything else is a
/// read-only catalog lookup. Failures never escape: they are logged and
/// answered with a generic message, leaving sessions as they were.
pub struct BotRouter {
    store: Arc<dyn CatalogStore>,
    gate: AdminGate,
    dialogue: Dialogue,
    sessions: Arc<SessionStore>,
}

impl BotRouter {
    pub fn new(store: Arc<dyn CatalogStore>, sessions: Arc<SessionStore>) -> Self {
        Self {
            gate: AdminGate::new(Arc::clone(&store)),
            dialogue: Dialogue::new(Arc::clone(&store)),
            store,
            sessions,
        }
    }

    #[cfg(test)]
    pub(crate) fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn dispatch(&self, event: InboundEvent) -> Vec<OutboundAction> {
        let identity = event.identity;
        let replies = match self.route(&event).await {
            Ok(replies) => replies,
            Err(err) => {
                error!(identity = %identity, kind = ?event.kind, %err, "failed to handle event");
                vec![Reply::text(GENERIC_FAILURE)]
            }
        };
        replies
            .into_iter()
            .map(|reply| reply.into_action(identity))
            .collect()
    }

    async fn route(&self, event: &InboundEvent) -> StoreResult<Vec<Reply>> {
        let identity = event.identity;
        let payload = event.payload.trim();
        match event.kind {
            EventKind::Selection if payload.starts_with(ADMIN_PREFIX) => {
                if !self.gate.is_authorized(identity, Some(payload)).await? {
                    warn!(identity = %identity, payload, "admin selection from non-admin");
                    return Ok(vec![Reply::text(ADMINS_ONLY)]);
                }
                let mut session = self.sessions.lock(identity).await;
                let reply = self
                    .dialogue
                    .handle(identity, &mut session, Input::Selection(payload.to_string()))
                    .await;
                Ok(vec![reply])
            }
            // Catalog menu buttons only navigate. They never feed a flow in
            // progress, whoever presses them.
            EventKind::Selection => self.lookup(event, &format!("{NAME_MARKER}{payload}")).await,
            EventKind::Text => self.route_text(event, payload).await,
        }
    }

    async fn route_text(&self, event: &InboundEvent, text: &str) -> StoreResult<Vec<Reply>> {
        let identity = event.identity;

        if text == "/is_admin" {
            let answer = if self.gate.is_admin(identity).await? {
                "Yes, you are an admin."
            } else {
                "No, you are not an admin."
            };
            return Ok(vec![Reply::text(answer)]);
        }

        if let Some(entry) = Entry::parse(text) {
            if self.gate.is_authorized(identity, None).await? {
                info!(identity = %identity, ?entry, "admin entry point");
                let mut session = self.sessions.lock(identity).await;
                return Ok(vec![self.dialogue.begin(identity, &mut session, entry)]);
            }
            warn!(identity = %identity, ?entry, "admin keyword from non-admin");
        } else if self.sessions.contains(identity) {
            let mut session = self.sessions.lock(identity).await;
            if !session.state.is_idle() {
                if self.gate.is_admin(identity).await? {
                    let reply = self
                        .dialogue
                        .handle(identity, &mut session, Input::Text(text.to_string()))
                        .await;
                    return Ok(vec![reply]);
                }
                warn!(identity = %identity, "admin rights revoked mid-flow, dropping session");
                session.reset();
            }
        }

        self.lookup(event, text).await
    }

    async fn lookup(&self, event: &InboundEvent, text: &str) -> StoreResult<Vec<Reply>> {
        let Some(rest) = text.strip_prefix(NAME_MARKER) else {
            return Ok(vec![Reply::text(NOT_UNDERSTOOD)]);
        };
        let head = rest.split_whitespace().next().unwrap_or_default();
        let Ok(name) = CommandName::new(head) else {
            return Ok(vec![Reply::text(NOT_UNDERSTOOD)]);
        };
        info!(identity = %event.identity, command = %name, "command lookup");

        match name.as_str() {
            START => self.start(&name, event.display_name.as_deref()).await,
            HELP => self.help(&name).await,
            _ => self.show(&name).await,
        }
    }

    async fn start(&self, name: &CommandName, display_name: Option<&str>) -> StoreResult<Vec<Reply>> {
        let Some(response) = self.store.get_response(name).await? else {
            return Ok(vec![missing(name)]);
        };
        let greeting = match display_name {
            Some(who) => format!("{response}, {who}"),
            None => response,
        };
        let mut replies = vec![Reply::text(greeting)];

        let children = self.store.children_of(name).await?;
        if !children.is_empty() {
            replies.push(Reply::with_menu(
                "Here is the list of commands that I can do:",
                buttons(&children),
            ));
        }
        Ok(replies)
    }

    async fn help(&self, name: &CommandName) -> StoreResult<Vec<Reply>> {
        let Some(response) = self.store.get_response(name).await? else {
            return Ok(vec![missing(name)]);
        };
        let mut names: Vec<CommandName> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .map(|command| command.name)
            .filter(|n| n.as_str() != START && n.as_str() != HELP)
            .collect();
        names.sort();

        let mut text = response;
        for listed in names {
            text.push('\n');
            text.push_str(&listed.marked());
        }
        Ok(vec![Reply::text(text)])
    }

    async fn show(&self, name: &CommandName) -> StoreResult<Vec<Reply>> {
        let response = self.store.get_response(name).await?;
        let children = self.store.children_of(name).await?;
        let reply = match (response, children.is_empty()) {
            (None, true) => missing(name),
            (Some(text), true) => Reply::text(text),
            (text, false) => Reply::with_menu(
                text.unwrap_or_else(|| "Choose:".to_string()),
                buttons(&children),
            ),
        };
        Ok(vec![reply])
    }
}

fn missing(name: &CommandName) -> Reply {
    Reply::text(format!(
        "Sorry, I don't have a response for the {} command.",
        name.marked()
    ))
}

fn buttons(children: &[CommandName]) -> Vec<MenuButton> {
    children
        .iter()
        .map(|child| MenuButton::new(child.as_str(), child.as_str()))
        .collect()
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
