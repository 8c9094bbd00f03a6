//! Pure transition planning
//!
//! [`plan`] decides what one operator message means in the current state
//! without touching the store. Anything that needs the catalog comes back as
//! a [`CatalogOp`] for the executor in [`crate::machine`] to apply.

use shared::domain::{CommandId, CommandName, EXIT_SENTINEL};
use storage::{CatalogStore, PanelRef, StoreError, StoreResult};

use crate::{
    choice::Choice,
    input::{
        ensure_assignable, parse_name, parse_name_and_optional_response,
        parse_name_and_response, parse_response, Input, InputError,
    },
    state::{DialogState, Reply, SessionContext, NOTHING_IN_PROGRESS},
};

/// A single store interaction requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOp {
    AddCommand {
        name: CommandName,
        response: String,
    },
    AddPanel {
        name: CommandName,
        response: Option<String>,
    },
    AddSubcommand {
        panel: CommandId,
        name: CommandName,
        response: String,
    },
    /// Existence check for an edit target.
    RequireCommand { name: CommandName },
    /// `child` must be linked under `panel`.
    RequireChild {
        panel: CommandName,
        child: CommandName,
    },
    Rename {
        old: CommandName,
        new: CommandName,
    },
    SetResponse {
        name: CommandName,
        response: String,
    },
    Remove { name: CommandName },
}

/// What a successfully applied [`CatalogOp`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(CommandId),
    Removed(Vec<CommandName>),
    Done,
}

impl CatalogOp {
    /// Whether applying this changes the catalog.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            CatalogOp::RequireCommand { .. } | CatalogOp::RequireChild { .. }
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CatalogOp::AddCommand { .. } => "add_command",
            CatalogOp::AddPanel { .. } => "add_panel",
            CatalogOp::AddSubcommand { .. } => "add_subcommand",
            CatalogOp::RequireCommand { .. } => "require_command",
            CatalogOp::RequireChild { .. } => "require_child",
            CatalogOp::Rename { .. } => "rename",
            CatalogOp::SetResponse { .. } => "set_response",
            CatalogOp::Remove { .. } => "remove",
        }
    }

    pub async fn apply(&self, store: &dyn CatalogStore) -> StoreResult<Applied> {
        match self {
            CatalogOp::AddCommand { name, response } => {
                store.add_command(name, response).await.map(Applied::Created)
            }
            CatalogOp::AddPanel { name, response } => store
                .add_panel(name, response.as_deref())
                .await
                .map(Applied::Created),
            CatalogOp::AddSubcommand {
                panel,
                name,
                response,
            } => store
                .add_subcommand(PanelRef::Id(*panel), name, response)
                .await
                .map(Applied::Created),
            CatalogOp::RequireCommand { name } => {
                if store.exists(name).await? {
                    Ok(Applied::Done)
                } else {
                    Err(StoreError::NotFound(name.to_string()))
                }
            }
            CatalogOp::RequireChild { panel, child } => {
                if store.children_of(panel).await?.contains(child) {
                    Ok(Applied::Done)
                } else {
                    Err(StoreError::NotFound(child.to_string()))
                }
            }
            CatalogOp::Rename { old, new } => {
                store.rename(old, new).await.map(|()| Applied::Done)
            }
            CatalogOp::SetResponse { name, response } => store
                .set_response(name, response)
                .await
                .map(|()| Applied::Done),
            CatalogOp::Remove { name } => store.remove(name).await.map(Applied::Removed),
        }
    }
}

/// Outcome of planning one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Malformed input: state and context stay as they are.
    Reprompt { error: InputError, reply: Reply },
    /// Move on without touching the store.
    Advance {
        state: DialogState,
        context: SessionContext,
        reply: Reply,
    },
    /// Apply `op`; on success move to `state`/`context` and send `done`.
    Apply {
        op: CatalogOp,
        state: DialogState,
        context: SessionContext,
        done: Reply,
    },
}

/// Plans the reaction of `state` to `input`. Never performs I/O.
pub fn plan(state: DialogState, context: &SessionContext, input: &Input) -> Plan {
    match step(state, context, input) {
        Ok(plan) => plan,
        Err(error) => reprompt(state, error),
    }
}

pub(crate) fn reprompt(state: DialogState, error: InputError) -> Plan {
    let prompt = state.prompt();
    let reply = Reply {
        text: format!("Incorrect format: {error}. {}", prompt.text),
        menu: prompt.menu,
    };
    Plan::Reprompt { error, reply }
}

fn advance(state: DialogState, context: SessionContext) -> Plan {
    Plan::Advance {
        state,
        context,
        reply: state.prompt(),
    }
}

/// A flow whose context went missing cannot continue.
fn lost_context() -> Plan {
    Plan::Advance {
        state: DialogState::Idle,
        context: SessionContext::default(),
        reply: Reply::text("This operation lost track of its progress. Please start again."),
    }
}

fn idle_with(reply: Reply) -> (DialogState, SessionContext, Reply) {
    (DialogState::Idle, SessionContext::default(), reply)
}

/// Accepts only the buttons offered in `state`.
fn selected(state: DialogState, input: &Input) -> Result<Choice, InputError> {
    match input {
        Input::Selection(token) => Choice::from_token(token)
            .filter(|choice| state.choices().contains(choice))
            .ok_or(InputError::UnexpectedChoice),
        Input::Text(_) => Err(InputError::UnexpectedChoice),
    }
}

/// A new name for an existing entry.
fn new_name(input: &Input) -> Result<CommandName, InputError> {
    let name = parse_name(input.as_text()?)?;
    ensure_assignable(&name)?;
    Ok(name)
}

fn step(state: DialogState, ctx: &SessionContext, input: &Input) -> Result<Plan, InputError> {
    use DialogState as S;

    let plan = match state {
        S::Idle => Plan::Advance {
            state: S::Idle,
            context: SessionContext::default(),
            reply: Reply::text(NOTHING_IN_PROGRESS),
        },

        S::AwaitingAddChoice => match selected(state, input)? {
            Choice::AddCommand => advance(S::AddCommandResponse, SessionContext::default()),
            _ => advance(S::AddPanelCommand, SessionContext::default()),
        },

        S::AddCommandResponse => {
            let (name, response) = parse_name_and_response(input.as_text()?)?;
            ensure_assignable(&name)?;
            let (state, context, done) = idle_with(Reply::text(format!(
                "Command {} with response '{response}' was successfully added.",
                name.marked()
            )));
            Plan::Apply {
                op: CatalogOp::AddCommand { name, response },
                state,
                context,
                done,
            }
        }

        S::AddPanelCommand => {
            let (name, response) = parse_name_and_optional_response(input.as_text()?)?;
            ensure_assignable(&name)?;
            Plan::Apply {
                done: Reply::text(format!(
                    "Panel {} was successfully added. Now you can add subcommands to this panel. {}",
                    name.marked(),
                    S::AddSubcommand.prompt().text
                )),
                context: SessionContext {
                    panel: Some(name.clone()),
                    ..SessionContext::default()
                },
                op: CatalogOp::AddPanel { name, response },
                state: S::AddSubcommand,
            }
        }

        S::AddSubcommand => {
            let text = input.as_text()?;
            if text.trim() == EXIT_SENTINEL {
                let (state, context, reply) = idle_with(Reply::text("Exited panel editing mode."));
                return Ok(Plan::Advance {
                    state,
                    context,
                    reply,
                });
            }
            let (Some(panel_id), Some(panel)) = (ctx.panel_id, ctx.panel.as_ref()) else {
                return Ok(lost_context());
            };
            let (name, response) = parse_name_and_response(text)?;
            ensure_assignable(&name)?;
            Plan::Apply {
                done: Reply::text(format!(
                    "Subcommand {} with response '{response}' was successfully added to panel {}. To exit panel editing mode, enter {EXIT_SENTINEL}.",
                    name.marked(),
                    panel.marked()
                )),
                op: CatalogOp::AddSubcommand {
                    panel: panel_id,
                    name,
                    response,
                },
                state: S::AddSubcommand,
                context: ctx.clone(),
            }
        }

        S::AwaitingEditKind => match selected(state, input)? {
            Choice::EditCommand => advance(S::AwaitingEditTarget, SessionContext::default()),
            _ => advance(S::AwaitingEditPanelTarget, SessionContext::default()),
        },

        S::AwaitingEditTarget => {
            let name = parse_name(input.as_text()?)?;
            Plan::Apply {
                context: SessionContext {
                    command: Some(name.clone()),
                    ..SessionContext::default()
                },
                op: CatalogOp::RequireCommand { name },
                state: S::AwaitingEditChoice,
                done: S::AwaitingEditChoice.prompt(),
            }
        }

        S::AwaitingEditChoice => match selected(state, input)? {
            Choice::EditCommandName => advance(S::EditCommandName, ctx.clone()),
            _ => advance(S::EditCommandResponse, ctx.clone()),
        },

        S::EditCommandName => {
            let Some(old) = ctx.command.clone() else {
                return Ok(lost_context());
            };
            let new = new_name(input)?;
            let (state, context, done) = idle_with(Reply::text(format!(
                "Command {} was successfully updated to {}.",
                old.marked(),
                new.marked()
            )));
            Plan::Apply {
                op: CatalogOp::Rename { old, new },
                state,
                context,
                done,
            }
        }

        S::EditCommandResponse => {
            let Some(name) = ctx.command.clone() else {
                return Ok(lost_context());
            };
            set_response_plan("command", name, input)?
        }

        S::AwaitingEditPanelTarget => {
            let name = parse_name(input.as_text()?)?;
            Plan::Apply {
                context: SessionContext {
                    panel: Some(name.clone()),
                    ..SessionContext::default()
                },
                op: CatalogOp::RequireCommand { name },
                state: S::EditPanelChoice,
                done: S::EditPanelChoice.prompt(),
            }
        }

        S::EditPanelChoice => match selected(state, input)? {
            Choice::EditPanelName => advance(S::EditPanelName, ctx.clone()),
            Choice::EditPanelResponse => advance(S::EditPanelResponse, ctx.clone()),
            _ => advance(S::EditPanelSubcommandTarget, ctx.clone()),
        },

        S::EditPanelName => {
            let Some(old) = ctx.panel.clone() else {
                return Ok(lost_context());
            };
            let new = new_name(input)?;
            let (state, context, done) = idle_with(Reply::text(format!(
                "Panel {} was successfully updated to {}.",
                old.marked(),
                new.marked()
            )));
            Plan::Apply {
                op: CatalogOp::Rename { old, new },
                state,
                context,
                done,
            }
        }

        S::EditPanelResponse => {
            let Some(name) = ctx.panel.clone() else {
                return Ok(lost_context());
            };
            set_response_plan("panel", name, input)?
        }

        S::EditPanelSubcommandTarget => {
            let Some(panel) = ctx.panel.clone() else {
                return Ok(lost_context());
            };
            let child = parse_name(input.as_text()?)?;
            Plan::Apply {
                context: SessionContext {
                    subcommand: Some(child.clone()),
                    ..ctx.clone()
                },
                op: CatalogOp::RequireChild { panel, child },
                state: S::EditPanelSubcommandChoice,
                done: S::EditPanelSubcommandChoice.prompt(),
            }
        }

        S::EditPanelSubcommandChoice => match selected(state, input)? {
            Choice::EditSubcommandName => advance(S::EditSubcommandName, ctx.clone()),
            _ => advance(S::EditSubcommandResponse, ctx.clone()),
        },

        S::EditSubcommandName => {
            let Some(old) = ctx.subcommand.clone() else {
                return Ok(lost_context());
            };
            let new = new_name(input)?;
            let (state, context, done) = idle_with(Reply::text(format!(
                "Subcommand {} was successfully updated to {}.",
                old.marked(),
                new.marked()
            )));
            Plan::Apply {
                op: CatalogOp::Rename { old, new },
                state,
                context,
                done,
            }
        }

        S::EditSubcommandResponse => {
            let Some(name) = ctx.subcommand.clone() else {
                return Ok(lost_context());
            };
            set_response_plan("subcommand", name, input)?
        }

        S::AwaitingRemoveTarget => {
            let name = parse_name(input.as_text()?)?;
            let (state, context, done) = idle_with(Reply::text(format!(
                "Command {} was successfully removed.",
                name.marked()
            )));
            Plan::Apply {
                op: CatalogOp::Remove { name },
                state,
                context,
                done,
            }
        }
    };
    Ok(plan)
}

fn set_response_plan(kind: &str, name: CommandName, input: &Input) -> Result<Plan, InputError> {
    let response = parse_response(input.as_text()?)?;
    let (state, context, done) = idle_with(Reply::text(format!(
        "Response for {kind} {} was successfully updated to '{response}'.",
        name.marked()
    )));
    Ok(Plan::Apply {
        op: CatalogOp::SetResponse { name, response },
        state,
        context,
        done,
    })
}

#[cfg(test)]
#[path = "tests/transition_tests.rs"]
mod tests;
