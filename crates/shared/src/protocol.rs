use serde::{Deserialize, Serialize};

use crate::domain::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Free text typed by the user.
    Text,
    /// A press on a menu button; the payload is the button's token.
    Selection,
}

/// Event delivered by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub identity: Identity,
    pub kind: EventKind,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl InboundEvent {
    pub fn text(identity: Identity, payload: impl Into<String>) -> Self {
        Self {
            identity,
            kind: EventKind::Text,
            payload: payload.into(),
            display_name: None,
        }
    }

    pub fn selection(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            kind: EventKind::Selection,
            payload: token.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuButton {
    pub label: String,
    pub token: String,
}

impl MenuButton {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Message the transport should deliver back to `identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAction {
    pub identity: Identity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<MenuButton>>,
}

impl OutboundAction {
    pub fn text(identity: Identity, text: impl Into<String>) -> Self {
        Self {
            identity,
            text: text.into(),
            menu: None,
        }
    }

    pub fn with_menu(identity: Identity, text: impl Into<String>, menu: Vec<MenuButton>) -> Self {
        Self {
            identity,
            text: text.into(),
            menu: Some(menu),
        }
    }
}
