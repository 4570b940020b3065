//! Three subscription slots, one per kind. A slot is either empty or holds
//! exactly one live handle; filling an occupied slot cancels the old handle.
//! A handle whose feed has already stopped counts as absent.

use log::{debug, warn};

use crate::data::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Groups,
    Messages,
    Reconnect,
}

impl SubscriptionKind {
    pub const ALL: [SubscriptionKind; 3] = [
        SubscriptionKind::Groups,
        SubscriptionKind::Messages,
        SubscriptionKind::Reconnect,
    ];
}

#[derive(Debug, Default)]
pub enum Slot {
    #[default]
    Absent,
    Active(Subscription),
}

impl Slot {
    pub fn is_active(&self) -> bool {
        matches!(self, Slot::Active(subscription) if !subscription.is_finished())
    }

    fn take(&mut self) -> Option<Subscription> {
        match std::mem::take(self) {
            Slot::Active(subscription) => Some(subscription),
            Slot::Absent => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionManager {
    groups: Slot,
    messages: Slot,
    reconnect: Slot,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: SubscriptionKind) -> &Slot {
        match kind {
            SubscriptionKind::Groups => &self.groups,
            SubscriptionKind::Messages => &self.messages,
            SubscriptionKind::Reconnect => &self.reconnect,
        }
    }

    fn slot_mut(&mut self, kind: SubscriptionKind) -> &mut Slot {
        match kind {
            SubscriptionKind::Groups => &mut self.groups,
            SubscriptionKind::Messages => &mut self.messages,
            SubscriptionKind::Reconnect => &mut self.reconnect,
        }
    }

    pub fn is_active(&self, kind: SubscriptionKind) -> bool {
        self.slot(kind).is_active()
    }

    pub fn active_kinds(&self) -> Vec<SubscriptionKind> {
        SubscriptionKind::ALL
            .into_iter()
            .filter(|kind| self.is_active(*kind))
            .collect()
    }

    pub fn activate(&mut self, kind: SubscriptionKind, subscription: Subscription) {
        let slot = self.slot_mut(kind);
        match slot.take() {
            Some(previous) if previous.is_finished() => {
                debug!("{:?} feed had ended, replacing", kind);
            }
            Some(previous) => {
                warn!("{:?} subscription replaced while active", kind);
                previous.cancel();
            }
            None => {}
        }
        *slot = Slot::Active(subscription);
        debug!("{:?} subscription active", kind);
    }

    /// Cancels `kind` if active. Returns whether anything was cancelled.
    /// A feed that already ended is cleared without counting as cancelled.
    pub fn cancel(&mut self, kind: SubscriptionKind) -> bool {
        match self.slot_mut(kind).take() {
            Some(subscription) if subscription.is_finished() => {
                debug!("{:?} feed had already ended", kind);
                false
            }
            Some(subscription) => {
                subscription.cancel();
                debug!("{:?} subscription cancelled", kind);
                true
            }
            None => false,
        }
    }

    /// Cancels every active subscription and returns the kinds cancelled.
    pub fn cancel_all(&mut self) -> Vec<SubscriptionKind> {
        SubscriptionKind::ALL
            .into_iter()
            .filter(|kind| self.cancel(*kind))
            .collect()
    }
}
