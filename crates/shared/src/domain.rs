use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading character operators put in front of a command name.
pub const NAME_MARKER: char = '/';

/// Literal that ends the subcommand-collection loop.
pub const EXIT_SENTINEL: &str = "/exit";

pub const MAX_NAME_LEN: usize = 64;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(Identity);
id_newtype!(CommandId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("command name is empty")]
    Empty,
    #[error("command name must start with '{NAME_MARKER}'")]
    MissingMarker,
    #[error("command name must not contain whitespace")]
    Whitespace,
    #[error("command name is longer than {MAX_NAME_LEN} characters")]
    TooLong,
}

/// Catalog key, stored without the leading marker. Case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandName(String);

impl CommandName {
    pub fn new(raw: impl Into<String>) -> Result<Self, NameError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(NameError::Whitespace);
        }
        if raw.chars().count() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        Ok(Self(raw))
    }

    /// Parses operator input of the form `/name`.
    pub fn from_marked(token: &str) -> Result<Self, NameError> {
        let bare = token
            .strip_prefix(NAME_MARKER)
            .ok_or(NameError::MissingMarker)?;
        Self::new(bare)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as operators and users see it, marker included.
    pub fn marked(&self) -> String {
        format!("{NAME_MARKER}{}", self.0)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommandName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommandName> for String {
    fn from(value: CommandName) -> Self {
        value.0
    }
}

impl AsRef<str> for CommandName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub name: CommandName,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Panel membership edge, resolved to names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelLink {
    pub panel: CommandName,
    pub child: CommandName,
}
