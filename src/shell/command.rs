//! Line commands read from stdin, translated into shell events.
//!
//! ```text
//! login <id> <jwt>       logout
//! go <Route> [groupId] [title...]
//! back                   tab <chats|settings>
//! foreground | background | inactive
//! refetch                state            quit
//! ```

use serde_json::Value;

use crate::core::route::{NavigationAction, Params, Tab};
use crate::core::{Action, AuthState, RouteName};
use crate::lifecycle::AppStatus;
use crate::shell::ShellEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(ShellEvent),
    PrintState,
    Quit,
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        Command::Event(ShellEvent::Dispatch(action))
    }
}

/// Parses one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    if verb.starts_with('#') {
        return Ok(None);
    }

    let command = match verb.to_ascii_lowercase().as_str() {
        "login" => {
            let id = words
                .next()
                .ok_or("usage: login <id> <jwt>")?
                .parse()
                .map_err(|_| "login: id must be a number".to_string())?;
            let jwt = words.next().ok_or("usage: login <id> <jwt>")?;
            Action::Login(AuthState::new(id, jwt)).into()
        }
        "logout" => Action::Logout.into(),
        "go" => {
            let route: RouteName = words.next().ok_or("usage: go <Route> [groupId] [title]")?.parse()?;
            let mut params = Params::new();
            if let Some(group_id) = words.next() {
                let group_id: i64 = group_id
                    .parse()
                    .map_err(|_| "go: groupId must be a number".to_string())?;
                params.insert("groupId".to_string(), Value::from(group_id));
                let title = words.collect::<Vec<_>>().join(" ");
                if !title.is_empty() {
                    params.insert("title".to_string(), Value::from(title));
                }
            }
            Action::Navigation(NavigationAction::navigate_with(route, params)).into()
        }
        "back" => Action::Navigation(NavigationAction::back()).into(),
        "tab" => {
            let tab: Tab = words.next().ok_or("usage: tab <chats|settings>")?.parse()?;
            Action::Navigation(NavigationAction::JumpToTab(tab)).into()
        }
        "foreground" | "background" | "inactive" => {
            Command::Event(ShellEvent::AppState(verb.parse::<AppStatus>()?))
        }
        "refetch" => Command::Event(ShellEvent::Refetch),
        "state" => Command::PrintState,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}
