//! # Live Update Merge
//!
//! Folds server pushes into the cached user. Both functions borrow the
//! previous user and build a new one, so the shell can compare old and new
//! to decide what changed.

use log::{debug, warn};

use crate::core::route::{NavigationState, RouteName};
use crate::data::types::{Group, GroupId, Message, MessageEdge, User};

/// Puts `message` in its group's latest-message slot and bumps the unread
/// count, unless the group is open on screen.
///
/// A message for a group the user does not have is dropped.
pub fn merge_new_message(previous: &User, message: &Message, nav: &NavigationState) -> User {
    let Some(position) = previous.groups.iter().position(|g| g.id == message.to.id) else {
        warn!(
            "messageAdded {} for unknown group {}, ignoring",
            message.id, message.to.id
        );
        return previous.clone();
    };

    let mut next = previous.clone();
    let group = &mut next.groups[position];
    group.messages.edges = vec![MessageEdge::for_message(message.clone())];
    if !is_viewing(nav, group.id) {
        group.unread_count = group.unread_count.saturating_add(1);
    }
    debug!(
        "Merged message {} into group {} (unread {})",
        message.id, group.id, group.unread_count
    );
    next
}

/// Appends `group`. Pushes for a group already in the list are dropped.
pub fn merge_new_group(previous: &User, group: &Group) -> User {
    if previous.groups.iter().any(|g| g.id == group.id) {
        debug!("groupAdded {} already cached, ignoring", group.id);
        return previous.clone();
    }
    let mut next = previous.clone();
    next.groups.push(group.clone());
    next
}

fn is_viewing(nav: &NavigationState, group_id: GroupId) -> bool {
    let current = nav.current();
    current.route_name == RouteName::Messages && current.group_id() == Some(group_id)
}
