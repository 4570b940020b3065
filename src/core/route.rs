//! # Route Table
//!
//! The static description of every screen the client can show, plus the
//! stack router that turns a `NavigationAction` into the next
//! `NavigationState`.
//!
//! ```text
//! Stack (mode: modal)
//! ├── Main ──────────► Tabs: Chats (initial), Settings
//! ├── Signin
//! ├── Messages         params: groupId, title
//! ├── GroupDetails     params: id, title
//! ├── NewGroup
//! └── FinalizeGroup    params: selected
//! ```
//!
//! `get_state_for_action` returns `None` when an action cannot be applied
//! (back on the root, reset with a bad index, unknown key). Callers decide
//! what `None` means; the reducer keeps the previous state.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::GroupId;

/// Route parameters, kept as a JSON object so screens can carry arbitrary data.
pub type Params = Map<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Main,
    Signin,
    Messages,
    GroupDetails,
    NewGroup,
    FinalizeGroup,
}

impl RouteName {
    pub const ALL: [RouteName; 6] = [
        RouteName::Main,
        RouteName::Signin,
        RouteName::Messages,
        RouteName::GroupDetails,
        RouteName::NewGroup,
        RouteName::FinalizeGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteName::Main => "Main",
            RouteName::Signin => "Signin",
            RouteName::Messages => "Messages",
            RouteName::GroupDetails => "GroupDetails",
            RouteName::NewGroup => "NewGroup",
            RouteName::FinalizeGroup => "FinalizeGroup",
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteName {
    type Err = String;

    /// Case-insensitive so CLI input like `messages` resolves.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteName::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown route: {s}"))
    }
}

/// Tabs nested inside the `Main` route.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Chats,
    Settings,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Chats => "Chats",
            Tab::Settings => "Settings",
        }
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Tab::Chats, Tab::Settings]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tab: {s}"))
    }
}

/// How stack screens are presented.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Card,
    Modal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TabState {
    pub index: usize,
    pub tabs: Vec<Tab>,
}

impl TabState {
    pub fn current(&self) -> Option<Tab> {
        self.tabs.get(self.index).copied()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub key: String,
    pub route_name: RouteName,
    #[serde(default)]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs: Option<TabState>,
}

impl RouteEntry {
    /// The `groupId` param, if the screen is bound to a group.
    pub fn group_id(&self) -> Option<GroupId> {
        self.params.get("groupId").and_then(Value::as_i64)
    }
}

/// The stack of screens. `index` always points into `routes`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub index: usize,
    pub routes: Vec<RouteEntry>,
}

impl NavigationState {
    pub fn current(&self) -> &RouteEntry {
        &self.routes[self.index]
    }

    pub fn current_route(&self) -> RouteName {
        self.current().route_name
    }

    /// The active tab when `Main` is on top.
    pub fn current_tab(&self) -> Option<Tab> {
        self.current().tabs.as_ref().and_then(TabState::current)
    }
}

/// Everything the router knows how to do.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationAction {
    /// Leaves the stack as it is. A fresh stack comes from
    /// [`RouteTable::initial_state`].
    Init,
    Navigate { route: RouteName, params: Params },
    /// Pop the current screen, or the keyed screen and everything above it.
    Back { key: Option<String> },
    /// Replace the stack with the routes named by `actions` (all `Navigate`).
    Reset {
        index: usize,
        actions: Vec<NavigationAction>,
    },
    SetParams { key: String, params: Params },
    JumpToTab(Tab),
}

impl NavigationAction {
    pub fn navigate(route: RouteName) -> Self {
        NavigationAction::Navigate {
            route,
            params: Params::new(),
        }
    }

    pub fn navigate_with(route: RouteName, params: Params) -> Self {
        NavigationAction::Navigate { route, params }
    }

    pub fn back() -> Self {
        NavigationAction::Back { key: None }
    }
}

/// Static route table: initial route, presentation mode, and the tab set of `Main`.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub initial_route: RouteName,
    pub mode: Mode,
    pub tabs: Vec<Tab>,
    pub initial_tab: Tab,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::app()
    }
}

impl RouteTable {
    /// The client's navigator: modal stack rooted at `Main`, which opens on `Chats`.
    pub fn app() -> Self {
        Self {
            initial_route: RouteName::Main,
            mode: Mode::Modal,
            tabs: vec![Tab::Chats, Tab::Settings],
            initial_tab: Tab::Chats,
        }
    }

    pub fn initial_state(&self) -> NavigationState {
        NavigationState {
            index: 0,
            routes: vec![self.new_entry(self.initial_route, Params::new())],
        }
    }

    fn new_entry(&self, route_name: RouteName, params: Params) -> RouteEntry {
        let tabs = (route_name == RouteName::Main).then(|| TabState {
            index: self
                .tabs
                .iter()
                .position(|t| *t == self.initial_tab)
                .unwrap_or(0),
            tabs: self.tabs.clone(),
        });
        RouteEntry {
            key: format!("id-{}", uuid::Uuid::new_v4()),
            route_name,
            params,
            tabs,
        }
    }

    /// The router's transition function.
    pub fn get_state_for_action(
        &self,
        action: &NavigationAction,
        state: &NavigationState,
    ) -> Option<NavigationState> {
        match action {
            NavigationAction::Init => Some(state.clone()),
            NavigationAction::Navigate { route, params } => {
                Some(self.navigate(state, *route, params))
            }
            NavigationAction::Back { key } => back(state, key.as_deref()),
            NavigationAction::Reset { index, actions } => self.reset(*index, actions),
            NavigationAction::SetParams { key, params } => set_params(state, key, params),
            NavigationAction::JumpToTab(tab) => jump_to_tab(state, *tab),
        }
    }

    fn navigate(&self, state: &NavigationState, route: RouteName, params: &Params) -> NavigationState {
        // The root screen is never stacked twice; navigating to it pops back.
        if route == self.initial_route
            && let Some(pos) = state.routes.iter().position(|r| r.route_name == route)
        {
            let mut next = state.clone();
            next.routes.truncate(pos + 1);
            next.index = pos;
            next.routes[pos].params.extend(params.clone());
            return next;
        }

        let mut next = state.clone();
        next.routes.truncate(state.index + 1);
        next.routes.push(self.new_entry(route, params.clone()));
        next.index = next.routes.len() - 1;
        debug!("Pushed {} (depth {})", route, next.routes.len());
        next
    }

    fn reset(&self, index: usize, actions: &[NavigationAction]) -> Option<NavigationState> {
        if index >= actions.len() {
            return None;
        }
        let routes = actions
            .iter()
            .map(|action| match action {
                NavigationAction::Navigate { route, params } => {
                    Some(self.new_entry(*route, params.clone()))
                }
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(NavigationState { index, routes })
    }
}

fn back(state: &NavigationState, key: Option<&str>) -> Option<NavigationState> {
    let from = match key {
        Some(key) => state.routes.iter().position(|r| r.key == key)?,
        None => state.index,
    };
    if from == 0 {
        return None;
    }
    let mut next = state.clone();
    next.routes.truncate(from);
    next.index = from - 1;
    Some(next)
}

fn set_params(state: &NavigationState, key: &str, params: &Params) -> Option<NavigationState> {
    let pos = state.routes.iter().position(|r| r.key == key)?;
    let mut next = state.clone();
    next.routes[pos].params.extend(params.clone());
    Some(next)
}

fn jump_to_tab(state: &NavigationState, tab: Tab) -> Option<NavigationState> {
    let pos = state
        .routes
        .iter()
        .position(|r| r.route_name == RouteName::Main)?;
    let tab_index = state.routes[pos]
        .tabs
        .as_ref()?
        .tabs
        .iter()
        .position(|t| *t == tab)?;

    let mut next = state.clone();
    next.routes.truncate(pos + 1);
    next.index = pos;
    if let Some(tabs) = next.routes[pos].tabs.as_mut() {
        tabs.index = tab_index;
    }
    Some(next)
}

/// Builds `{"groupId": id, "title": title}` for the Messages screen.
pub fn group_params(group_id: GroupId, title: &str) -> Params {
    let mut params = Params::new();
    params.insert("groupId".to_string(), Value::from(group_id));
    params.insert("title".to_string(), Value::from(title));
    params
}
