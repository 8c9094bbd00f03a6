//! Dialog state types

use shared::{
    domain::{CommandId, CommandName, Identity},
    protocol::{MenuButton, OutboundAction},
};
use tokio::time::{Duration, Instant};

use crate::choice::{menu, Choice};

pub(crate) const NOTHING_IN_PROGRESS: &str =
    "Nothing is in progress. Send /add_command, /edit_command or /remove_command to start.";

/// Where an admin currently is in a multi-step flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialogState {
    #[default]
    Idle,

    // Adding
    AwaitingAddChoice,
    AddCommandResponse,
    AddPanelCommand,
    /// Loops until the exit sentinel arrives.
    AddSubcommand,

    // Editing a plain command
    AwaitingEditKind,
    AwaitingEditTarget,
    AwaitingEditChoice,
    EditCommandName,
    EditCommandResponse,

    // Editing a panel and its subcommands
    AwaitingEditPanelTarget,
    EditPanelChoice,
    EditPanelName,
    EditPanelResponse,
    EditPanelSubcommandTarget,
    EditPanelSubcommandChoice,
    EditSubcommandName,
    EditSubcommandResponse,

    // Removing
    AwaitingRemoveTarget,
}

impl DialogState {
    pub fn is_idle(self) -> bool {
        self == DialogState::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DialogState::Idle => "idle",
            DialogState::AwaitingAddChoice => "awaiting_add_choice",
            DialogState::AddCommandResponse => "add_command_response",
            DialogState::AddPanelCommand => "add_panel_command",
            DialogState::AddSubcommand => "add_subcommand",
            DialogState::AwaitingEditKind => "awaiting_edit_kind",
            DialogState::AwaitingEditTarget => "awaiting_edit_target",
            DialogState::AwaitingEditChoice => "awaiting_edit_choice",
            DialogState::EditCommandName => "edit_command_name",
            DialogState::EditCommandResponse => "edit_command_response",
            DialogState::AwaitingEditPanelTarget => "awaiting_edit_panel_target",
            DialogState::EditPanelChoice => "edit_panel_choice",
            DialogState::EditPanelName => "edit_panel_name",
            DialogState::EditPanelResponse => "edit_panel_response",
            DialogState::EditPanelSubcommandTarget => "edit_panel_subcommand_target",
            DialogState::EditPanelSubcommandChoice => "edit_panel_subcommand_choice",
            DialogState::EditSubcommandName => "edit_subcommand_name",
            DialogState::EditSubcommandResponse => "edit_subcommand_response",
            DialogState::AwaitingRemoveTarget => "awaiting_remove_target",
        }
    }

    /// Menu choices accepted in this state; empty for text-collecting states.
    pub fn choices(self) -> &'static [Choice] {
        match self {
            DialogState::AwaitingAddChoice => &[Choice::AddCommand, Choice::AddPanel],
            DialogState::AwaitingEditKind => &[Choice::EditCommand, Choice::EditPanel],
            DialogState::AwaitingEditChoice => {
                &[Choice::EditCommandName, Choice::EditCommandResponse]
            }
            DialogState::EditPanelChoice => &[
                Choice::EditPanelName,
                Choice::EditPanelResponse,
                Choice::EditPanelSubcommand,
            ],
            DialogState::EditPanelSubcommandChoice => {
                &[Choice::EditSubcommandName, Choice::EditSubcommandResponse]
            }
            _ => &[],
        }
    }

    /// What the operator is asked when entering (or re-entering) this state.
    pub fn prompt(self) -> Reply {
        let text = match self {
            DialogState::Idle => NOTHING_IN_PROGRESS,
            DialogState::AwaitingAddChoice | DialogState::AwaitingEditKind => "Choose:",
            DialogState::AddCommandResponse => {
                "Please enter the command name (starting with '/') and the response text separated by a space."
            }
            DialogState::AddPanelCommand => {
                "Please enter the panel command name (starting with '/') and, optionally, the response text separated by a space."
            }
            DialogState::AddSubcommand => {
                "Please enter the subcommand name (starting with '/') and the response text separated by a space. To exit panel editing mode, enter /exit."
            }
            DialogState::AwaitingEditTarget => {
                "Please enter the command name (starting with '/') that you want to edit."
            }
            DialogState::AwaitingEditChoice => "Choose what you want to edit exactly:",
            DialogState::EditCommandName => {
                "Please enter the new name for the command (starting with '/')."
            }
            DialogState::EditCommandResponse => "Please enter the new response for the command.",
            DialogState::AwaitingEditPanelTarget => {
                "Please enter the panel-command name (starting with '/') that you want to edit."
            }
            DialogState::EditPanelChoice | DialogState::EditPanelSubcommandChoice => {
                "Choose what you want to edit:"
            }
            DialogState::EditPanelName => {
                "Please enter the new panel command name (starting with '/')."
            }
            DialogState::EditPanelResponse | DialogState::EditSubcommandResponse => {
                "Please enter the new response text."
            }
            DialogState::EditPanelSubcommandTarget => {
                "Please enter the subcommand name (starting with '/') that you want to edit."
            }
            DialogState::EditSubcommandName => {
                "Please enter the new subcommand name (starting with '/')."
            }
            DialogState::AwaitingRemoveTarget => {
                "Which command do you want to remove? (Enter the command name in form \"/some_command\"):"
            }
        };
        let choices = self.choices();
        if choices.is_empty() {
            Reply::text(text)
        } else {
            Reply::with_menu(text, menu(choices))
        }
    }
}

/// Values collected by earlier steps of a flow and read by later ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Command chosen for editing.
    pub command: Option<CommandName>,
    /// Panel being filled or edited.
    pub panel: Option<CommandName>,
    pub panel_id: Option<CommandId>,
    /// Subcommand of `panel` chosen for editing.
    pub subcommand: Option<CommandName>,
}

impl SessionContext {
    pub fn is_empty(&self) -> bool {
        *self == SessionContext::default()
    }
}

/// Per-identity conversation. Absent or idle means no flow is running.
#[derive(Debug)]
pub struct Session {
    pub state: DialogState,
    pub context: SessionContext,
    last_seen: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: DialogState::Idle,
            context: SessionContext::default(),
            last_seen: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.state = DialogState::Idle;
        self.context = SessionContext::default();
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_stale(&self, idle_timeout: Duration) -> bool {
        self.last_seen.elapsed() >= idle_timeout
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound text plus optional menu, not yet addressed to anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub menu: Option<Vec<MenuButton>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: None,
        }
    }

    pub fn with_menu(text: impl Into<String>, menu: Vec<MenuButton>) -> Self {
        Self {
            text: text.into(),
            menu: Some(menu),
        }
    }

    pub fn into_action(self, identity: Identity) -> OutboundAction {
        match self.menu {
            Some(menu) => OutboundAction::with_menu(identity, self.text, menu),
            None => OutboundAction::text(identity, self.text),
        }
    }
}
