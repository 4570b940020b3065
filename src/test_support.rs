//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::data::{
    DataSource, Group, GroupId, GroupRef, LiveEvent, Message, MessageConnection, MessageId,
    Subscription, TransportError, User, UserId, UserRef, UserUpdate,
};

/// An in-memory data source that records every call.
/// Feeds deliver only what a test pushes through `emit`.
#[derive(Default)]
pub struct FakeDataSource {
    user: Mutex<Option<User>>,
    token: Mutex<Option<String>>,
    fetches: AtomicUsize,
    updates: Mutex<Vec<UserUpdate>>,
    opened: Mutex<Vec<&'static str>>,
    message_scopes: Mutex<Vec<Vec<GroupId>>>,
    cancelled: Arc<Mutex<Vec<&'static str>>>,
    senders: Mutex<Vec<(&'static str, Sender<LiveEvent>)>>,
    feeds_end: AtomicBool,
}

impl FakeDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: User) -> Self {
        let source = Self::new();
        source.set_user(Some(user));
        source
    }

    /// Replaces what the "server" returns for the user query.
    pub fn set_user(&self, user: Option<User>) {
        *self.user.lock().unwrap() = user;
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<UserUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// How many subscriptions of `kind` were opened.
    pub fn opened(&self, kind: &str) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn message_scopes(&self) -> Vec<Vec<GroupId>> {
        self.message_scopes.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<&'static str> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Makes every feed opened from now on stop by itself at once, the
    /// way a server rejection or `complete` ends a real one.
    pub fn end_feeds_immediately(&self, end: bool) {
        self.feeds_end.store(end, Ordering::SeqCst);
    }

    /// Pushes `event` through the most recent `kind` feed's sender.
    pub async fn emit(&self, kind: &str, event: LiveEvent) {
        let sender = self
            .senders
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, sender)| sender.clone())
            .unwrap();
        sender.send(event).await.unwrap();
    }

    fn track(&self, kind: &'static str, sender: Sender<LiveEvent>) -> Subscription {
        self.opened.lock().unwrap().push(kind);
        self.senders.lock().unwrap().push((kind, sender));
        if self.feeds_end.load(Ordering::SeqCst) {
            return Subscription::from_task(tokio::spawn(async {}));
        }
        let cancelled = self.cancelled.clone();
        Subscription::new(move || cancelled.lock().unwrap().push(kind))
    }
}

#[async_trait]
impl DataSource for FakeDataSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn set_token(&self, jwt: Option<String>) {
        *self.token.lock().unwrap() = jwt;
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.user
            .lock()
            .unwrap()
            .clone()
            .filter(|user| user.id == id)
            .ok_or_else(|| TransportError::NotFound(format!("user {id}")))
    }

    async fn update_user(&self, update: &UserUpdate) -> Result<User, TransportError> {
        self.updates.lock().unwrap().push(update.clone());
        let mut user = self.user.lock().unwrap();
        let user = user
            .as_mut()
            .ok_or_else(|| TransportError::NotFound("current user".to_string()))?;
        if let Some(registration_id) = &update.registration_id {
            user.registration_id = Some(registration_id.clone());
        }
        if let Some(badge_count) = update.badge_count {
            user.badge_count = badge_count;
        }
        Ok(user.clone())
    }

    fn subscribe_to_groups(&self, _user_id: UserId, sender: Sender<LiveEvent>) -> Subscription {
        self.track("groups", sender)
    }

    fn subscribe_to_messages(
        &self,
        group_ids: Vec<GroupId>,
        sender: Sender<LiveEvent>,
    ) -> Subscription {
        self.message_scopes.lock().unwrap().push(group_ids);
        self.track("messages", sender)
    }

    fn on_reconnected(&self, sender: Sender<LiveEvent>) -> Subscription {
        self.track("reconnect", sender)
    }
}

/// User 1 with the given `(group id, unread count)` groups.
pub fn user_with_groups(groups: &[(GroupId, u32)]) -> User {
    User {
        id: 1,
        email: "ada@example.com".to_string(),
        username: Some("ada".to_string()),
        registration_id: None,
        badge_count: 0,
        groups: groups
            .iter()
            .map(|(id, unread)| Group {
                unread_count: *unread,
                ..group(*id)
            })
            .collect(),
    }
}

pub fn group(id: GroupId) -> Group {
    Group {
        id,
        name: format!("Group {id}"),
        unread_count: 0,
        messages: MessageConnection::default(),
    }
}

pub fn message_to(group_id: GroupId, id: MessageId) -> Message {
    Message {
        id,
        to: GroupRef { id: group_id },
        from: Some(UserRef {
            id: 2,
            username: Some("bob".to_string()),
        }),
        content: format!("message {id}"),
        created_at: None,
    }
}
