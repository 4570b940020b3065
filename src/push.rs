//! # Push Notifications
//!
//! The registration and badge surface the lifecycle coordinator needs.
//! Delivery itself belongs to the platform; `LocalPushService` keeps the
//! same state in process so the shell can run without one.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, info};

#[derive(Debug)]
pub enum PushError {
    /// No push backend on this platform.
    Unavailable(String),
    /// The backend refused to register the device.
    Registration(String),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Unavailable(msg) => write!(f, "push unavailable: {msg}"),
            PushError::Registration(msg) => write!(f, "push registration failed: {msg}"),
        }
    }
}

impl std::error::Error for PushError {}

#[async_trait]
pub trait PushService: Send + Sync {
    /// Registers the device and returns its registration token.
    async fn init(&self) -> Result<String, PushError>;

    /// The current registration token, if registered.
    fn token(&self) -> Option<String>;

    /// Drops the registration.
    fn clear(&self);

    fn badge_number(&self) -> u32;

    fn set_badge_number(&self, count: u32);

    fn remove_all_delivered_notifications(&self);
}

#[derive(Debug, Default)]
struct LocalPushState {
    token: Option<String>,
    badge: u32,
    delivered: Vec<String>,
}

/// In-process push state. Tokens are random unless a fixed one is configured.
#[derive(Debug, Default)]
pub struct LocalPushService {
    fixed_token: Option<String>,
    state: Mutex<LocalPushState>,
}

impl LocalPushService {
    pub fn new(fixed_token: Option<String>) -> Self {
        Self {
            fixed_token,
            state: Mutex::new(LocalPushState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LocalPushState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a delivered notification and bumps the badge.
    pub fn deliver(&self, title: impl Into<String>) {
        let mut state = self.state();
        state.delivered.push(title.into());
        state.badge += 1;
    }

    pub fn delivered_count(&self) -> usize {
        self.state().delivered.len()
    }
}

#[async_trait]
impl PushService for LocalPushService {
    async fn init(&self) -> Result<String, PushError> {
        let mut state = self.state();
        let token = state
            .token
            .clone()
            .or_else(|| self.fixed_token.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        state.token = Some(token.clone());
        info!("Push registered");
        Ok(token)
    }

    fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    fn clear(&self) {
        debug!("Push registration cleared");
        self.state().token = None;
    }

    fn badge_number(&self) -> u32 {
        self.state().badge
    }

    fn set_badge_number(&self, count: u32) {
        self.state().badge = count;
    }

    fn remove_all_delivered_notifications(&self) {
        self.state().delivered.clear();
    }
}
