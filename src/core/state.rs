//! # Application State
//!
//! The store's state: navigation plus authentication. Server data (the
//! current user and its groups) is not here; it lives in the shell's query
//! cache and is replaced on every push or refetch.
//!
//! ```text
//! AppState
//! ├── nav: NavigationState     // screen stack, index of current screen
//! └── auth: AuthState          // user id + jwt, persisted across launches
//! ```
//!
//! State changes only happen through `update(state, table, action)` in action.rs.

use serde::{Deserialize, Serialize};

use crate::core::route::{NavigationState, RouteTable};
use crate::data::UserId;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub jwt: Option<String>,
}

impl AuthState {
    pub fn new(id: UserId, jwt: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            jwt: Some(jwt.into()),
        }
    }

    /// A present, non-empty token. Anything else counts as signed out.
    pub fn is_authenticated(&self) -> bool {
        self.jwt.as_deref().is_some_and(|jwt| !jwt.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub nav: NavigationState,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(table: &RouteTable) -> Self {
        Self {
            nav: table.initial_state(),
            auth: AuthState::default(),
        }
    }
}
