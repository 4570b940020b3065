pub mod graphql;
pub mod merge;
pub mod source;
pub mod types;

pub use graphql::GraphqlClient;
pub use merge::{merge_new_group, merge_new_message};
pub use source::{DataSource, LiveEvent, Subscription, TransportError};
pub use types::{
    Group, GroupId, GroupRef, Message, MessageConnection, MessageEdge, MessageId, User, UserId,
    UserRef, UserUpdate,
};
