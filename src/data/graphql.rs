//! GraphQL client for the chat server.
//!
//! Queries and mutations are plain `POST {base}/graphql`. Subscriptions use
//! the graphql-sse "distinct connections" mode: `POST {base}/graphql/stream`
//! with `Accept: text/event-stream`, answered by `event: next` frames whose
//! data is a `{"data": ...}` payload, and a final `event: complete`.
//!
//! When a subscription stream drops, its task waits `reconnect_delay` and
//! reopens it. Every successful reopen is broadcast to `on_reconnected`
//! listeners so the shell can refetch whatever it missed.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::sync::mpsc::Sender;

use super::source::{DataSource, LiveEvent, Subscription, TransportError};
use super::types::{Group, GroupId, Message, User, UserId, UserUpdate};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Documents
// ============================================================================

const USER_QUERY: &str = "query user($id: Int) { \
    user(id: $id) { id email username registrationId badgeCount \
    groups { id name unreadCount \
    messages(first: 1) { edges { cursor node { id to { id } from { id username } content createdAt } } } } } }";

const UPDATE_USER_MUTATION: &str = "mutation updateUser($user: UpdateUserInput!) { \
    updateUser(user: $user) { id email username registrationId badgeCount } }";

const MESSAGE_ADDED_SUBSCRIPTION: &str = "subscription onMessageAdded($groupIds: [Int]) { \
    messageAdded(groupIds: $groupIds) { id to { id } from { id username } content createdAt } }";

const GROUP_ADDED_SUBSCRIPTION: &str = "subscription onGroupAdded($userId: Int) { \
    groupAdded(userId: $userId) { id name unreadCount \
    messages(first: 1) { edges { cursor node { id to { id } from { id username } content createdAt } } } } }";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize, Debug)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Deserialize, Debug)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize, Debug)]
struct GraphqlError {
    message: String,
}

impl<T> GraphqlResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        if !self.errors.is_empty() {
            return Err(TransportError::GraphQl(
                self.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        self.data
            .ok_or_else(|| TransportError::Parse("response has no data".to_string()))
    }
}

#[derive(Deserialize, Debug)]
struct UserData {
    user: Option<User>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateUserData {
    update_user: User,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MessageAddedData {
    message_added: Message,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GroupAddedData {
    group_added: Group,
}

/// Why a subscription stream stopped.
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Completed,
    Disconnected,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct GraphqlClient {
    base_url: String,
    client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    reconnected: broadcast::Sender<()>,
    reconnect_delay: Duration,
}

impl GraphqlClient {
    /// Creates a client for the server at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let (reconnected, _) = broadcast::channel(16);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
            reconnected,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|token| token.clone())
    }

    fn request(&self, path: &str, query: &str, variables: &Value) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&GraphqlRequest { query, variables });
        match self.bearer() {
            Some(jwt) => builder.header("Authorization", format!("Bearer {jwt}")),
            None => builder,
        }
    }

    /// Sends a request and checks the HTTP status.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::Config(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        debug!("GraphQL response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("GraphQL server error: {} - {}", status, err_body);
            return Err(TransportError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, TransportError> {
        debug!("GraphQL request: {} bytes, variables={}", query.len(), variables);
        let response = self.send(self.request("/graphql", query, &variables)).await?;
        let body: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        body.into_result()
    }

    async fn open_stream(&self, query: &str, variables: &Value) -> Result<reqwest::Response, TransportError> {
        let builder = self
            .request("/graphql/stream", query, variables)
            .header("Accept", "text/event-stream");
        self.send(builder).await
    }

    /// Spawns a task that keeps `query` streaming into `sender`, reopening
    /// the stream after transient failures.
    fn subscribe<T, F>(
        &self,
        label: &'static str,
        query: &'static str,
        variables: Value,
        sender: Sender<LiveEvent>,
        to_event: F,
    ) -> Subscription
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> LiveEvent + Send + Sync + 'static,
    {
        let client = self.clone();
        info!("Subscribing to {} ({})", label, variables);
        let handle = tokio::spawn(async move {
            let mut reconnecting = false;
            loop {
                match client.open_stream(query, &variables).await {
                    Ok(response) => {
                        if reconnecting {
                            info!("{} subscription reconnected", label);
                            // No listeners is fine.
                            let _ = client.reconnected.send(());
                            reconnecting = false;
                        }
                        match read_stream::<T, F>(response, &sender, &to_event).await {
                            Ok(StreamEnd::Completed) => {
                                info!("{} subscription completed by server", label);
                                return;
                            }
                            Err(TransportError::ChannelClosed) => {
                                debug!("{} subscription receiver dropped", label);
                                return;
                            }
                            Ok(StreamEnd::Disconnected) => {
                                warn!("{} stream closed, reconnecting", label);
                            }
                            Err(e) => warn!("{} stream error: {}", label, e),
                        }
                    }
                    Err(e) if !e.is_retryable() => {
                        warn!("{} subscription rejected: {}", label, e);
                        return;
                    }
                    Err(e) => warn!("{} subscription failed: {}", label, e),
                }
                reconnecting = true;
                tokio::time::sleep(client.reconnect_delay).await;
            }
        });
        Subscription::from_task(handle)
    }
}

/// Raw bytes waiting for a newline. Lines are decoded only once complete,
/// so a character split across network chunks arrives intact.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

/// Reads SSE frames off `response`, forwarding each `next` payload.
async fn read_stream<T, F>(
    response: reqwest::Response,
    sender: &Sender<LiveEvent>,
    to_event: &F,
) -> Result<StreamEnd, TransportError>
where
    T: DeserializeOwned,
    F: Fn(T) -> LiveEvent,
{
    let mut buffer = LineBuffer::default();
    let mut current_event: Option<String> = None;
    let mut delivered = 0usize;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Network(e.to_string()))?;
        buffer.extend(&chunk);

        while let Some(line) = buffer.next_line() {
            // Blank separators and `:` keep-alive comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(event) = line.strip_prefix("event:") {
                let event = event.trim();
                if event == "complete" {
                    debug!("Stream complete after {} events", delivered);
                    return Ok(StreamEnd::Completed);
                }
                current_event = Some(event.to_string());
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                let event = current_event.take();
                match event.as_deref() {
                    Some("next") | None => {
                        let payload = serde_json::from_str::<GraphqlResponse<T>>(data)
                            .map_err(|e| TransportError::Parse(e.to_string()))
                            .and_then(GraphqlResponse::into_result);
                        match payload {
                            Ok(payload) => {
                                if sender.send(to_event(payload)).await.is_err() {
                                    return Err(TransportError::ChannelClosed);
                                }
                                delivered += 1;
                            }
                            Err(e) => warn!("Skipping subscription frame: {}", e),
                        }
                    }
                    Some(other) => debug!("Ignoring SSE event '{}': {} bytes", other, data.len()),
                }
            }
        }
    }

    debug!("Stream ended after {} events", delivered);
    Ok(StreamEnd::Disconnected)
}

#[async_trait]
impl DataSource for GraphqlClient {
    fn name(&self) -> &str {
        "graphql"
    }

    fn set_token(&self, jwt: Option<String>) {
        if let Ok(mut token) = self.token.write() {
            *token = jwt;
        }
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, TransportError> {
        let data: UserData = self.execute(USER_QUERY, json!({ "id": id })).await?;
        data.user
            .ok_or_else(|| TransportError::NotFound(format!("user {id}")))
    }

    async fn update_user(&self, update: &UserUpdate) -> Result<User, TransportError> {
        let data: UpdateUserData = self
            .execute(UPDATE_USER_MUTATION, json!({ "user": update }))
            .await?;
        Ok(data.update_user)
    }

    fn subscribe_to_groups(&self, user_id: UserId, sender: Sender<LiveEvent>) -> Subscription {
        self.subscribe(
            "groupAdded",
            GROUP_ADDED_SUBSCRIPTION,
            json!({ "userId": user_id }),
            sender,
            |data: GroupAddedData| LiveEvent::GroupAdded(data.group_added),
        )
    }

    fn subscribe_to_messages(
        &self,
        group_ids: Vec<GroupId>,
        sender: Sender<LiveEvent>,
    ) -> Subscription {
        self.subscribe(
            "messageAdded",
            MESSAGE_ADDED_SUBSCRIPTION,
            json!({ "groupIds": group_ids }),
            sender,
            |data: MessageAddedData| LiveEvent::MessageAdded(data.message_added),
        )
    }

    fn on_reconnected(&self, sender: Sender<LiveEvent>) -> Subscription {
        let mut reconnected = self.reconnected.subscribe();
        Subscription::from_task(tokio::spawn(async move {
            loop {
                match reconnected.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if sender.send(LiveEvent::Reconnected).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }))
    }
}
