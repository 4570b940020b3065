//! # Lifecycle Coordinator
//!
//! Bridges user presence and app foreground/background changes to the
//! live feeds and push registration.
//!
//! ```text
//! user: none → some   register push (update token if it changed)
//!                     reconnect handler, groups feed, messages feed
//! user: some → none   clear push, cancel every active feed
//! group count changed resubscribe messages (scope is the group set)
//! feed ended          resubscribe on the next user change
//! app → active        badge > 0: clear tray, badge = 0 locally and on server
//! ```
//!
//! Each sign-in opens a new session. Feeds write into a per-session channel
//! whose events are tagged with the session number on the way out, so events
//! still queued from a signed-out account can be told apart and dropped.
//!
//! Remote calls made here are fire-and-forget: failures are logged and
//! dropped, never retried.

pub mod subscriptions;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, Sender};

use crate::data::{DataSource, LiveEvent, User, UserUpdate};
use crate::push::PushService;

pub use subscriptions::{Slot, SubscriptionKind, SubscriptionManager};

const FEED_BUFFER: usize = 100;

/// A live event stamped with the session whose feed produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: u64,
    pub event: LiveEvent,
}

/// Platform app state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppStatus {
    #[default]
    Active,
    Inactive,
    Background,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppStatus::Active => "active",
            AppStatus::Inactive => "inactive",
            AppStatus::Background => "background",
        };
        f.write_str(label)
    }
}

impl FromStr for AppStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "foreground" => Ok(AppStatus::Active),
            "inactive" => Ok(AppStatus::Inactive),
            "background" => Ok(AppStatus::Background),
            other => Err(format!("unknown app state: {other}")),
        }
    }
}

pub struct LifecycleCoordinator {
    source: Arc<dyn DataSource>,
    push: Arc<dyn PushService>,
    events: Sender<SessionEvent>,
    feed: Option<Sender<LiveEvent>>,
    session: u64,
    subscriptions: SubscriptionManager,
    app_status: AppStatus,
}

impl LifecycleCoordinator {
    pub fn new(
        source: Arc<dyn DataSource>,
        push: Arc<dyn PushService>,
        events: Sender<SessionEvent>,
    ) -> Self {
        Self {
            source,
            push,
            events,
            feed: None,
            session: 0,
            subscriptions: SubscriptionManager::new(),
            app_status: AppStatus::default(),
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn app_status(&self) -> AppStatus {
        self.app_status
    }

    /// The current session. Starts at 0 and advances on every sign-in.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Sender for the current session's feeds, opening a session if none is.
    fn feed(&mut self) -> Sender<LiveEvent> {
        if let Some(feed) = &self.feed {
            return feed.clone();
        }
        self.session += 1;
        let session = self.session;
        let (feed, mut rx) = mpsc::channel::<LiveEvent>(FEED_BUFFER);
        let events = self.events.clone();
        // Ends once every feed of the session has dropped its sender.
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send(SessionEvent { session, event }).await.is_err() {
                    return;
                }
            }
        });
        debug!("Opened feed session {}", session);
        self.feed = Some(feed.clone());
        feed
    }

    /// Reacts to the cached user changing from `previous` to `next`.
    pub async fn user_changed(&mut self, previous: Option<&User>, next: Option<&User>) {
        let Some(user) = next else {
            self.teardown();
            return;
        };

        if previous.is_none() {
            self.register_push(user).await;
        }

        if !self.subscriptions.is_active(SubscriptionKind::Reconnect) {
            let feed = self.feed();
            let handler = self.source.on_reconnected(feed);
            self.subscriptions
                .activate(SubscriptionKind::Reconnect, handler);
        }

        let messages_down =
            !user.groups.is_empty() && !self.subscriptions.is_active(SubscriptionKind::Messages);
        if messages_down || previous.is_none_or(|p| p.groups.len() != user.groups.len()) {
            self.subscribe_to_messages(user);
        }

        if !self.subscriptions.is_active(SubscriptionKind::Groups) {
            self.subscribe_to_groups(user);
        }
    }

    /// (Re)starts the messages feed for the user's current groups.
    pub fn subscribe_to_messages(&mut self, user: &User) {
        self.subscriptions.cancel(SubscriptionKind::Messages);
        if user.groups.is_empty() {
            return;
        }
        let sender = self.feed();
        let feed = self.source.subscribe_to_messages(user.group_ids(), sender);
        self.subscriptions.activate(SubscriptionKind::Messages, feed);
    }

    pub fn subscribe_to_groups(&mut self, user: &User) {
        let sender = self.feed();
        let feed = self.source.subscribe_to_groups(user.id, sender);
        self.subscriptions.activate(SubscriptionKind::Groups, feed);
    }

    fn teardown(&mut self) {
        if self.push.token().is_some() {
            self.push.clear();
        }
        self.feed = None;
        let cancelled = self.subscriptions.cancel_all();
        if !cancelled.is_empty() {
            info!("Signed out, cancelled {:?}", cancelled);
        }
    }

    async fn register_push(&self, user: &User) {
        let token = match self.push.init().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Push registration failed: {}", e);
                return;
            }
        };
        if user.registration_id.as_deref() == Some(token.as_str()) {
            return;
        }
        info!("Registration token changed for user {}, updating server", user.id);
        if let Err(e) = self.source.update_user(&UserUpdate::registration(token)).await {
            warn!("Failed to update registration token: {}", e);
        }
    }

    /// Records the new app state; coming to the foreground clears the badge.
    pub async fn app_state_changed(&mut self, status: AppStatus, user: Option<&User>) {
        info!("App state changed: {} -> {}", self.app_status, status);
        self.app_status = status;

        if status != AppStatus::Active || user.is_none() || self.push.badge_number() == 0 {
            return;
        }
        self.push.remove_all_delivered_notifications();
        self.push.set_badge_number(0);
        if let Err(e) = self.source.update_user(&UserUpdate::clear_badge()).await {
            warn!("Failed to reset badge count on server: {}", e);
        }
    }
}
