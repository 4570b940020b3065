use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type GroupId = i64;
pub type MessageId = i64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub registration_id: Option<String>,
    #[serde(default)]
    pub badge_count: u32,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl User {
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id).collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub messages: MessageConnection,
}

impl Group {
    /// The cached latest message, if the group has one.
    pub fn latest_message(&self) -> Option<&Message> {
        self.messages.edges.first().map(|edge| &edge.node)
    }
}

/// Relay-style connection. Only the newest edge is cached per group.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageConnection {
    #[serde(default)]
    pub edges: Vec<MessageEdge>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageEdge {
    pub cursor: String,
    pub node: Message,
}

impl MessageEdge {
    pub fn for_message(message: Message) -> Self {
        Self {
            cursor: encode_cursor(message.id),
            node: message,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRef {
    pub id: GroupId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub to: GroupRef,
    #[serde(default)]
    pub from: Option<UserRef>,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Sparse input for the `updateUser` mutation. Unset fields are left alone.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_count: Option<u32>,
}

impl UserUpdate {
    pub fn registration(registration_id: impl Into<String>) -> Self {
        Self {
            registration_id: Some(registration_id.into()),
            ..Default::default()
        }
    }

    pub fn clear_badge() -> Self {
        Self {
            badge_count: Some(0),
            ..Default::default()
        }
    }
}

/// Pagination cursor: base64 of the decimal message id.
pub fn encode_cursor(id: MessageId) -> String {
    STANDARD.encode(id.to_string())
}
