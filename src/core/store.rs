//! # Store
//!
//! Holds the `AppState`, runs every dispatched action through `update()`,
//! then hands (before, action, after) to each middleware.
//!
//! The navigation middleware is the bridge between the store and whatever
//! renders screens: listeners registered with `add_navigation_listener`
//! are called with the new `NavigationState` whenever it changes.

use log::debug;

use crate::core::action::{Action, Effect, update};
use crate::core::route::{NavigationState, RouteTable};
use crate::core::state::AppState;

pub trait Middleware: Send {
    fn after_dispatch(&mut self, before: &AppState, action: &Action, after: &AppState);
}

pub type NavigationListener = Box<dyn FnMut(&NavigationState) + Send>;

/// Notifies listeners when the navigation state changes.
pub struct NavigationMiddleware {
    key: String,
    listeners: Vec<NavigationListener>,
}

impl NavigationMiddleware {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: NavigationListener) {
        self.listeners.push(listener);
    }
}

impl Middleware for NavigationMiddleware {
    fn after_dispatch(&mut self, before: &AppState, _action: &Action, after: &AppState) {
        if before.nav == after.nav {
            return;
        }
        debug!(
            "[{}] navigation changed: {} -> {}",
            self.key,
            before.nav.current_route(),
            after.nav.current_route()
        );
        for listener in &mut self.listeners {
            listener(&after.nav);
        }
    }
}

/// Logs every action, so a session can be replayed from the log.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn after_dispatch(&mut self, _before: &AppState, action: &Action, after: &AppState) {
        debug!("Action {:?} -> {}", action, after.nav.current_route());
    }
}

pub struct Store {
    state: AppState,
    table: RouteTable,
    navigation: NavigationMiddleware,
    middleware: Vec<Box<dyn Middleware>>,
}

impl Store {
    pub fn new(table: RouteTable) -> Self {
        Self {
            state: AppState::new(&table),
            table,
            navigation: NavigationMiddleware::new("root"),
            middleware: vec![Box::new(LoggingMiddleware)],
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn add_middleware(&mut self, middleware: Box<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn add_navigation_listener(&mut self, listener: NavigationListener) {
        self.navigation.add_listener(listener);
    }

    pub fn dispatch(&mut self, action: Action) -> Effect {
        let before = self.state.clone();
        let effect = update(&mut self.state, &self.table, action.clone());

        self.navigation.after_dispatch(&before, &action, &self.state);
        for middleware in &mut self.middleware {
            middleware.after_dispatch(&before, &action, &self.state);
        }
        effect
    }
}
