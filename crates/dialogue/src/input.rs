use shared::domain::{CommandName, NameError, NAME_MARKER};
use thiserror::Error;

/// Names that belong to the bot itself and cannot become catalog entries.
pub const RESERVED_NAMES: &[&str] = &[
    "add_command",
    "edit_command",
    "remove_command",
    "cancel",
    "is_admin",
    "exit",
];

/// One operator message, as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Selection(String),
}

/// Malformed operator input. Never changes session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("expected a command name starting with '{NAME_MARKER}'")]
    MissingName,
    #[error("{0}")]
    BadName(#[from] NameError),
    #[error("expected only the command name")]
    UnexpectedText,
    #[error("the response text is missing")]
    MissingResponse,
    #[error("/{0} is reserved")]
    Reserved(String),
    #[error("please use one of the buttons")]
    UnexpectedChoice,
    #[error("please type your answer instead of pressing a button")]
    ExpectedText,
}

impl Input {
    pub fn as_text(&self) -> Result<&str, InputError> {
        match self {
            Input::Text(text) => Ok(text),
            Input::Selection(_) => Err(InputError::ExpectedText),
        }
    }
}

/// Splits off the first whitespace-separated field.
fn split_head(text: &str) -> (&str, Option<&str>) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => {
            let rest = rest.trim_start();
            (head, (!rest.is_empty()).then_some(rest))
        }
        None => (text, None),
    }
}

fn marked_name(token: &str) -> Result<CommandName, InputError> {
    if token.is_empty() || !token.starts_with(NAME_MARKER) {
        return Err(InputError::MissingName);
    }
    Ok(CommandName::from_marked(token)?)
}

/// `/name` and nothing else.
pub fn parse_name(text: &str) -> Result<CommandName, InputError> {
    match split_head(text) {
        (head, None) => marked_name(head),
        (_, Some(_)) => Err(InputError::UnexpectedText),
    }
}

/// `/name response text`, the response being everything after the name.
pub fn parse_name_and_response(text: &str) -> Result<(CommandName, String), InputError> {
    let (head, rest) = split_head(text);
    let name = marked_name(head)?;
    let response = rest.ok_or(InputError::MissingResponse)?;
    Ok((name, response.to_string()))
}

/// `/name [response text]`.
pub fn parse_name_and_optional_response(
    text: &str,
) -> Result<(CommandName, Option<String>), InputError> {
    let (head, rest) = split_head(text);
    Ok((marked_name(head)?, rest.map(str::to_string)))
}

/// Free response text; only emptiness is rejected.
pub fn parse_response(text: &str) -> Result<String, InputError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InputError::MissingResponse);
    }
    Ok(text.to_string())
}

/// Rejects names that would shadow the bot's own keywords.
pub fn ensure_assignable(name: &CommandName) -> Result<(), InputError> {
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(InputError::Reserved(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_with_response_keeps_inner_spacing() {
        let (name, response) = parse_name_and_response("/faq  Read  the pins").expect("parse");
        assert_eq!(name.as_str(), "faq");
        assert_eq!(response, "Read  the pins");
    }

    #[test]
    fn name_with_response_requires_both_fields() {
        assert_eq!(
            parse_name_and_response("/faq"),
            Err(InputError::MissingResponse)
        );
        assert_eq!(
            parse_name_and_response("faq answer"),
            Err(InputError::MissingName)
        );
        assert_eq!(parse_name_and_response("   "), Err(InputError::MissingName));
    }

    #[test]
    fn optional_response_may_be_absent() {
        let (name, response) = parse_name_and_optional_response("/menu").expect("parse");
        assert_eq!(name.as_str(), "menu");
        assert!(response.is_none());

        let (_, response) = parse_name_and_optional_response("/menu Top menu").expect("parse");
        assert_eq!(response.as_deref(), Some("Top menu"));
    }

    #[test]
    fn bare_name_rejects_trailing_text() {
        assert_eq!(parse_name(" /faq ").expect("parse").as_str(), "faq");
        assert_eq!(parse_name("/faq extra"), Err(InputError::UnexpectedText));
        assert_eq!(
            parse_name("/"),
            Err(InputError::BadName(NameError::Empty))
        );
    }

    #[test]
    fn reserved_names_are_not_assignable() {
        let exit = CommandName::new("exit").expect("name");
        assert_eq!(
            ensure_assignable(&exit),
            Err(InputError::Reserved("exit".into()))
        );
        let faq = CommandName::new("faq").expect("name");
        assert!(ensure_assignable(&faq).is_ok());
    }
}
