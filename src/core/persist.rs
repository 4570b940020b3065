//! # State Persistence
//!
//! Saves the auth slice to `~/.chatnav/state.json` and reads it back at
//! launch, where it becomes the payload of `Action::Rehydrate`.
//!
//! Writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::action::PersistedState;

/// On-disk envelope around the persisted state.
#[derive(Serialize, Deserialize, Debug)]
struct StateFile {
    saved_at: i64,
    state: PersistedState,
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn save_state(path: &Path, state: &PersistedState) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = StateFile {
        saved_at: Utc::now().timestamp(),
        state: state.clone(),
    };
    atomic_write_json(path, &file)?;
    debug!("State saved to {}", path.display());
    Ok(())
}

/// Loads persisted state. A missing file is `Ok(None)`.
pub fn load_state(path: &Path) -> io::Result<Option<PersistedState>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let file: StateFile =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug!("State loaded from {} (saved at {})", path.display(), file.saved_at);
    Ok(Some(file.state))
}

/// Load for rehydration: anything unreadable counts as signed out.
pub fn load_or_default(path: Option<&Path>) -> PersistedState {
    let Some(path) = path else {
        return PersistedState::default();
    };
    match load_state(path) {
        Ok(state) => state.unwrap_or_default(),
        Err(e) => {
            warn!("Failed to load state from {}: {}", path.display(), e);
            PersistedState::default()
        }
    }
}
