use shared::protocol::MenuButton;

/// Every admin menu token starts with this; the gate rejects admin-looking
/// actions without it.
pub const ADMIN_PREFIX: &str = "admin_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Choice {
    AddCommand,
    AddPanel,
    EditCommand,
    EditPanel,
    EditCommandName,
    EditCommandResponse,
    EditPanelName,
    EditPanelResponse,
    EditPanelSubcommand,
    EditSubcommandName,
    EditSubcommandResponse,
}

impl Choice {
    pub const ALL: [Choice; 11] = [
        Choice::AddCommand,
        Choice::AddPanel,
        Choice::EditCommand,
        Choice::EditPanel,
        Choice::EditCommandName,
        Choice::EditCommandResponse,
        Choice::EditPanelName,
        Choice::EditPanelResponse,
        Choice::EditPanelSubcommand,
        Choice::EditSubcommandName,
        Choice::EditSubcommandResponse,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Choice::AddCommand => "admin_add_command_response",
            Choice::AddPanel => "admin_add_command_panel",
            Choice::EditCommand => "admin_edit_command",
            Choice::EditPanel => "admin_edit_panel_command",
            Choice::EditCommandName => "admin_edit_command_name",
            Choice::EditCommandResponse => "admin_edit_command_response",
            Choice::EditPanelName => "admin_edit_panel_name",
            Choice::EditPanelResponse => "admin_edit_panel_response",
            Choice::EditPanelSubcommand => "admin_edit_panel_subcommand",
            Choice::EditSubcommandName => "admin_edit_subcommand_name",
            Choice::EditSubcommandResponse => "admin_edit_subcommand_response",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Choice::AddCommand => "Command",
            Choice::AddPanel => "Panel",
            Choice::EditCommand => "Edit command",
            Choice::EditPanel => "Edit panel-command",
            Choice::EditCommandName => "Edit command name",
            Choice::EditCommandResponse => "Edit command response",
            Choice::EditPanelName => "Edit panel-command name",
            Choice::EditPanelResponse => "Edit panel-command response",
            Choice::EditPanelSubcommand => "Edit panel-subcommand (name or response)",
            Choice::EditSubcommandName => "Edit subcommand name",
            Choice::EditSubcommandResponse => "Edit subcommand response",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.token() == token)
    }

    pub fn button(self) -> MenuButton {
        MenuButton::new(self.label(), self.token())
    }
}

pub fn menu(choices: &[Choice]) -> Vec<MenuButton> {
    choices.iter().map(|choice| choice.button()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_token_is_admin_prefixed_and_resolves_back() {
        for choice in Choice::ALL {
            assert!(choice.token().starts_with(ADMIN_PREFIX), "{choice:?}");
            assert_eq!(Choice::from_token(choice.token()), Some(choice));
        }
        assert_eq!(Choice::from_token("help"), None);
    }
}
