//! # App Shell
//!
//! The top-level component. Owns the store, the cached user (the query
//! cache) and the lifecycle coordinator, and is the only place any of them
//! are mutated.
//!
//! ```text
//!   stdin ───────► Command ──────┐
//!   live feeds ──► SessionEvent ─┤  (stale sessions dropped)
//!                                ▼
//!                  AppShell::handle(ShellEvent)
//!                                ├── Store::dispatch ──► persist, listeners
//!                                ├── merge_new_* ──► cached user
//!                                └── coordinator.user_changed(prev, next)
//! ```

pub mod command;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, Sender};

use crate::core::config::ResolvedConfig;
use crate::core::persist;
use crate::core::route::NavigationState;
use crate::core::store::Store;
use crate::core::{Action, AuthState, Effect, PersistedState, RouteTable};
use crate::data::{
    DataSource, GraphqlClient, LiveEvent, TransportError, User, UserId, UserUpdate,
    merge_new_group, merge_new_message,
};
use crate::lifecycle::{AppStatus, LifecycleCoordinator, SessionEvent};
use crate::push::{LocalPushService, PushService};

use command::{Command, parse_command};

/// Everything the shell reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    Dispatch(Action),
    Live(SessionEvent),
    AppState(AppStatus),
    Refetch,
}

pub struct AppShell {
    store: Store,
    source: Arc<dyn DataSource>,
    coordinator: LifecycleCoordinator,
    user: Option<User>,
    state_file: Option<PathBuf>,
}

impl AppShell {
    pub fn new(
        table: RouteTable,
        source: Arc<dyn DataSource>,
        push: Arc<dyn PushService>,
        events: Sender<SessionEvent>,
        state_file: Option<PathBuf>,
    ) -> Self {
        info!("Shell using data source: {}", source.name());
        Self {
            store: Store::new(table),
            coordinator: LifecycleCoordinator::new(source.clone(), push, events),
            source,
            user: None,
            state_file,
        }
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn navigation_state(&self) -> &NavigationState {
        &self.store.state().nav
    }

    pub fn auth(&self) -> &AuthState {
        &self.store.state().auth
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    /// Restores persisted auth. Without a token this lands on `Signin`.
    pub async fn rehydrate(&mut self) {
        let persisted = persist::load_or_default(self.state_file.as_deref());
        info!(
            "Rehydrating ({})",
            if persisted.has_token() { "signed in" } else { "signed out" }
        );
        self.dispatch(Action::Rehydrate(persisted)).await;
    }

    pub async fn handle(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Dispatch(action) => self.dispatch(action).await,
            ShellEvent::Live(tagged) => {
                if tagged.session == self.coordinator.session() {
                    self.apply_live(tagged.event).await;
                } else {
                    debug!(
                        "Dropping {:?} from ended session {}",
                        tagged.event, tagged.session
                    );
                }
            }
            ShellEvent::AppState(status) => {
                self.coordinator
                    .app_state_changed(status, self.user.as_ref())
                    .await
            }
            ShellEvent::Refetch => self.refetch().await,
        }
    }

    pub async fn dispatch(&mut self, action: Action) {
        if self.store.dispatch(action) == Effect::Persist {
            self.persist();
        }
        self.sync_user().await;
    }

    /// Re-runs the user query for the signed-in account.
    pub async fn refetch(&mut self) {
        let auth = self.auth();
        if !auth.is_authenticated() {
            debug!("Skipping refetch, not authenticated");
            return;
        }
        let Some(id) = auth.id else {
            warn!("Token present without a user id, skipping refetch");
            return;
        };
        self.load_user(id).await;
    }

    /// Sends `update` to the server and folds the result into the cached user.
    pub async fn update_user(&mut self, update: &UserUpdate) -> Result<(), TransportError> {
        let updated = self.source.update_user(update).await?;
        if let Some(user) = &self.user {
            let mut next = user.clone();
            next.registration_id = updated.registration_id;
            next.badge_count = updated.badge_count;
            self.replace_user(Some(next)).await;
        }
        Ok(())
    }

    async fn apply_live(&mut self, event: LiveEvent) {
        if matches!(event, LiveEvent::Reconnected) {
            info!("Live feed reconnected, refetching user");
            self.refetch().await;
            return;
        }
        let Some(user) = &self.user else {
            debug!("Dropping {:?}, no user loaded", event);
            return;
        };
        let next = match &event {
            LiveEvent::MessageAdded(message) => {
                merge_new_message(user, message, self.navigation_state())
            }
            LiveEvent::GroupAdded(group) => merge_new_group(user, group),
            LiveEvent::Reconnected => return,
        };
        self.replace_user(Some(next)).await;
    }

    /// Keeps the cached user in line with auth: no token means no user,
    /// a token for a different account means a fresh fetch.
    async fn sync_user(&mut self) {
        let auth = self.auth().clone();
        if !auth.is_authenticated() {
            self.source.set_token(None);
            if self.user.is_some() {
                self.replace_user(None).await;
            }
            return;
        }

        self.source.set_token(auth.jwt.clone());
        let Some(id) = auth.id else {
            warn!("Token present without a user id");
            return;
        };
        match self.user.as_ref().map(|user| user.id) {
            Some(cached) if cached == id => {}
            Some(_) => {
                self.replace_user(None).await;
                self.load_user(id).await;
            }
            None => self.load_user(id).await,
        }
    }

    async fn load_user(&mut self, id: UserId) {
        match self.source.fetch_user(id).await {
            Ok(user) => {
                debug!("Loaded user {} with {} groups", user.id, user.groups.len());
                self.replace_user(Some(user)).await;
            }
            Err(e) => warn!("Failed to load user {}: {}", id, e),
        }
    }

    async fn replace_user(&mut self, next: Option<User>) {
        let previous = std::mem::replace(&mut self.user, next);
        self.coordinator
            .user_changed(previous.as_ref(), self.user.as_ref())
            .await;
    }

    fn persist(&self) {
        let Some(path) = &self.state_file else {
            return;
        };
        let state = PersistedState::from(self.auth());
        if let Err(e) = persist::save_state(path, &state) {
            warn!("Failed to persist state to {}: {}", path.display(), e);
        }
    }
}

/// One-line summary of the current screen.
pub fn describe(nav: &NavigationState) -> String {
    let entry = nav.current();
    let mut text = entry.route_name.to_string();
    if let Some(tab) = nav.current_tab() {
        text.push_str(&format!(" [{}]", tab.as_str()));
    }
    if let Some(group_id) = entry.group_id() {
        text.push_str(&format!(" group={group_id}"));
    }
    if let Some(title) = entry.params.get("title").and_then(|t| t.as_str()) {
        text.push_str(&format!(" \"{title}\""));
    }
    text
}

fn print_state(shell: &AppShell) -> io::Result<()> {
    let auth = shell.auth();
    let snapshot = json!({
        "screen": describe(shell.navigation_state()),
        "navigation": shell.navigation_state(),
        "auth": {
            "id": auth.id,
            "authenticated": auth.is_authenticated(),
        },
        "appState": shell.coordinator().app_status().to_string(),
        "subscriptions": format!("{:?}", shell.coordinator().subscriptions().active_kinds()),
        "user": shell.current_user(),
    });
    let text = serde_json::to_string_pretty(&snapshot).map_err(io::Error::other)?;
    println!("{text}");
    Ok(())
}

// ============================================================================
// Event Loop
// ============================================================================

pub async fn run(config: ResolvedConfig) -> io::Result<()> {
    let source: Arc<dyn DataSource> = Arc::new(
        GraphqlClient::new(config.server_url.clone())
            .with_reconnect_delay(Duration::from_millis(config.reconnect_delay_ms)),
    );
    let push: Arc<dyn PushService> = Arc::new(LocalPushService::new(config.registration_id.clone()));

    // Live feeds forward into this channel; the loop below is its only reader.
    let (live_tx, mut live_rx) = mpsc::channel::<SessionEvent>(100);
    let mut shell = AppShell::new(
        RouteTable::app(),
        source,
        push,
        live_tx,
        config.state_file.clone(),
    );
    shell
        .store_mut()
        .add_navigation_listener(Box::new(|nav: &NavigationState| println!("-> {}", describe(nav))));

    println!("chatnav connected to {}", config.server_url);
    shell.rehydrate().await;
    println!("-> {}", describe(shell.navigation_state()));

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Ok(Some(command)) => {
                    if command_tx.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{e}"),
            }
        }
    });

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::Event(event)) => shell.handle(event).await,
                Some(Command::PrintState) => print_state(&shell)?,
                Some(Command::Quit) | None => break,
            },
            Some(event) = live_rx.recv() => {
                debug!("Live event: {:?}", event);
                shell.handle(ShellEvent::Live(event)).await;
            }
        }
    }

    reader.abort();
    info!("chatnav shutting down");
    Ok(())
}
