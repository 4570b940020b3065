//! # Core Application Logic
//!
//! Navigation and authentication state for the chat client.
//! It knows nothing about the network or any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • RouteTable (screens) │
//!                    │  • State (nav + auth)   │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │ Store + middleware
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │   Shell    │      │  Persist   │      │ Listeners  │
//!     │ (queries,  │      │ (auth on   │      │ (screen    │
//!     │  pushes)   │      │   disk)    │      │  renderer) │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`route`]: The static route table and its stack router
//! - [`state`]: `AppState`, navigation and auth in one place
//! - [`action`]: The `Action` enum and the reducers
//! - [`store`]: Dispatch plus middleware
//! - [`config`]: Settings file and resolution
//! - [`persist`]: Saving and restoring the auth slice

pub mod action;
pub mod config;
pub mod persist;
pub mod route;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use action::{Action, Effect, PersistedState};
pub use route::{NavigationAction, NavigationState, RouteName, RouteTable};
pub use state::{AppState, AuthState};
