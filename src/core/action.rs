//! # Actions
//!
//! Everything that can happen to the store becomes an `Action`.
//! User taps a group? That's `Action::Navigation(Navigate { Messages, .. })`.
//! Persisted state restored at launch? That's `Action::Rehydrate(payload)`.
//!
//! The `update()` function takes the current state and an action, applies
//! the change, and returns an `Effect` for the I/O layer. No side effects here.
//!
//! ```text
//! State + Action  →  update()  →  New State (+ Effect)
//! ```
//!
//! Navigation is reduced by `reduce()`, a pure function on `NavigationState`.
//! It delegates to the route table, except when the user is signed out:
//! a rehydrate without a token, or a logout, forces the `Signin` screen.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::route::{NavigationAction, NavigationState, RouteName, RouteTable};
use crate::core::state::{AppState, AuthState};

/// The slice of state written to disk and restored at launch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub auth: Option<AuthState>,
}

impl PersistedState {
    pub fn has_token(&self) -> bool {
        self.auth.as_ref().is_some_and(AuthState::is_authenticated)
    }
}

impl From<&AuthState> for PersistedState {
    fn from(auth: &AuthState) -> Self {
        Self {
            auth: Some(auth.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigation(NavigationAction),
    Rehydrate(PersistedState),
    Login(AuthState),
    Logout,
}

impl From<NavigationAction> for Action {
    fn from(action: NavigationAction) -> Self {
        Action::Navigation(action)
    }
}

/// Work the I/O layer should do after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Persist,
}

/// Navigation reducer. Never returns an empty state: when the router has no
/// answer for an action, the previous state is kept.
pub fn reduce(table: &RouteTable, state: &NavigationState, action: &Action) -> NavigationState {
    let next = match action {
        Action::Navigation(nav) => table.get_state_for_action(nav, state),
        Action::Rehydrate(payload) if !payload.has_token() => force_signin(table, state),
        Action::Logout => force_signin(table, state),
        Action::Rehydrate(_) | Action::Login(_) => Some(state.clone()),
    };
    next.unwrap_or_else(|| state.clone())
}

fn force_signin(table: &RouteTable, state: &NavigationState) -> Option<NavigationState> {
    if state.current_route() == RouteName::Signin {
        return Some(state.clone());
    }
    debug!(
        "No credentials, redirecting {} -> Signin",
        state.current_route()
    );
    table.get_state_for_action(&NavigationAction::navigate(RouteName::Signin), state)
}

/// Root reducer: navigation first, then the auth slice.
pub fn update(state: &mut AppState, table: &RouteTable, action: Action) -> Effect {
    state.nav = reduce(table, &state.nav, &action);

    match action {
        Action::Navigation(_) => Effect::None,
        Action::Rehydrate(payload) => {
            info!(
                "Rehydrated (authenticated: {})",
                payload.has_token()
            );
            state.auth = payload.auth.unwrap_or_default();
            Effect::None
        }
        Action::Login(auth) => {
            info!("Signed in as user {:?}", auth.id);
            state.auth = auth;
            Effect::Persist
        }
        Action::Logout => {
            info!("Signed out");
            state.auth = AuthState::default();
            Effect::Persist
        }
    }
}
