use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tokio::task::{AbortHandle, JoinHandle};

use super::types::{Group, GroupId, Message, User, UserId, UserUpdate};

/// Errors that can occur talking to the chat server.
#[derive(Debug)]
pub enum TransportError {
    /// Client misconfigured (bad URL). Not retryable.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// Server answered with a non-success HTTP status.
    Api { status: u16, message: String },
    /// Server answered 200 with a GraphQL `errors` array.
    GraphQl(Vec<String>),
    /// The queried record does not exist.
    NotFound(String),
    /// Failed to parse the server's response.
    Parse(String),
    /// The event receiver was dropped.
    ChannelClosed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Config(msg) => write!(f, "config error: {msg}"),
            TransportError::Network(msg) => write!(f, "network error: {msg}"),
            TransportError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            TransportError::GraphQl(messages) => {
                write!(f, "GraphQL error: {}", messages.join("; "))
            }
            TransportError::NotFound(what) => write!(f, "not found: {what}"),
            TransportError::Parse(msg) => write!(f, "parse error: {msg}"),
            TransportError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Network failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// A server push, delivered to the shell's event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    MessageAdded(Message),
    GroupAdded(Group),
    /// The transport dropped and came back; cached data may be stale.
    Reconnected,
}

/// Handle to a live feed. Cancelling (or dropping) stops it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
    task: Option<AbortHandle>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
            task: None,
        }
    }

    /// Ties the subscription to a spawned task; cancelling aborts it.
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        let abort = handle.abort_handle();
        Self {
            cancel: Some(Box::new(move || abort.abort())),
            task: Some(handle.abort_handle()),
        }
    }

    /// True once a task-backed feed has stopped on its own (server
    /// `complete`, a rejected request) or was aborted.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_some_and(AbortHandle::is_finished)
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.cancel.is_some())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Queries, mutations and subscriptions against the chat server.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Returns the name of the data source.
    fn name(&self) -> &str;

    /// Sets (or clears) the bearer token sent with every request.
    fn set_token(&self, jwt: Option<String>);

    async fn fetch_user(&self, id: UserId) -> Result<User, TransportError>;

    /// Applies `update` to the signed-in user and returns the new record.
    async fn update_user(&self, update: &UserUpdate) -> Result<User, TransportError>;

    fn subscribe_to_groups(&self, user_id: UserId, sender: Sender<LiveEvent>) -> Subscription;

    fn subscribe_to_messages(
        &self,
        group_ids: Vec<GroupId>,
        sender: Sender<LiveEvent>,
    ) -> Subscription;

    /// Sends `LiveEvent::Reconnected` each time the transport reconnects.
    fn on_reconnected(&self, sender: Sender<LiveEvent>) -> Subscription;
}
