//! Navigation history and presence decisions around a session's lifetime.
//!
//! The bridge remembers the last visited path in a [`KeyValueStore`] so a
//! reload of the game page can be told apart from arriving from elsewhere,
//! and decides whether leaving the page should announce a rest to the server.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gomoku_core::protocol::GameSnapshot;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Storage key for the last visited path.
pub const CURRENT_PATH_KEY: &str = "currentPath";

/// Storage key for the signed-in user, see [`crate::config::StoredUser`].
pub const USER_KEY: &str = "user";

// ---------------------------------------------------------------------------
// Key-value storage
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Abstraction over persistent string storage so navigation logic stays
/// platform-agnostic.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// A JSON object on disk. Writes that fail are logged and otherwise ignored;
/// the in-memory copy stays authoritative for this process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Load `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        let text = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, text).map_err(io)
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "could not save navigation state");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist_or_warn();
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist_or_warn();
        }
    }
}

// ---------------------------------------------------------------------------
// Navigation history
// ---------------------------------------------------------------------------

pub fn game_path(game_id: &str) -> String {
    format!("/game/{game_id}")
}

pub fn game_log_path(game_id: &str) -> String {
    format!("/game-log/{game_id}")
}

/// Current and previous path, persisted across restarts.
#[derive(Debug)]
pub struct NavigationHistory<S> {
    store: S,
    current: String,
    previous: String,
}

impl<S: KeyValueStore> NavigationHistory<S> {
    pub fn new(store: S) -> Self {
        let current = store.get(CURRENT_PATH_KEY).unwrap_or_default();
        Self {
            store,
            previous: current.clone(),
            current,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Record a visit to `path`. The previously stored path becomes `previous`,
    /// or `path` itself when nothing was stored.
    pub fn visit(&mut self, path: &str) {
        self.previous = match self.store.get(CURRENT_PATH_KEY) {
            Some(stored) if !stored.is_empty() => stored,
            _ => path.to_string(),
        };
        self.current = path.to_string();
        self.store.set(CURRENT_PATH_KEY, path);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

// ---------------------------------------------------------------------------
// Presence bridge
// ---------------------------------------------------------------------------

/// How to obtain the session's initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPlan {
    /// Use the snapshot handed over by the page that opened the game.
    UseHandoff(GameSnapshot),
    /// Verify the game still exists and fetch it.
    FetchFresh,
}

/// Why a session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Moving to another page while still seated.
    Navigate,
    /// The player gave up their seat.
    Leave,
    /// Logout has already announced the rest itself.
    Logout,
    /// The token was rejected; the server must not be contacted.
    SessionExpired,
    /// The watchdog asked for a rebuild of the same page.
    Reload,
}

#[derive(Debug)]
pub struct PresenceBridge<S> {
    history: NavigationHistory<S>,
    force_fresh: bool,
}

impl<S: KeyValueStore> PresenceBridge<S> {
    pub fn new(store: S) -> Self {
        Self {
            history: NavigationHistory::new(store),
            force_fresh: false,
        }
    }

    pub fn history(&self) -> &NavigationHistory<S> {
        &self.history
    }

    /// Record the visit to a game and decide where its state comes from.
    ///
    /// A handoff is used once: never on a reload of the same page, never for
    /// another game, and never after lost liveness.
    pub fn enter(&mut self, game_id: &str, handoff: Option<GameSnapshot>) -> EntryPlan {
        let path = game_path(game_id);
        self.history.visit(&path);
        let reloaded = self.history.previous() == path;
        let force_fresh = std::mem::take(&mut self.force_fresh);

        match handoff {
            Some(snapshot) if !reloaded && !force_fresh && snapshot.id == game_id => {
                debug!(game_id, "using handed-over snapshot");
                EntryPlan::UseHandoff(snapshot)
            }
            _ => {
                debug!(game_id, reloaded, force_fresh, "fetching fresh snapshot");
                EntryPlan::FetchFresh
            }
        }
    }

    /// Decide whether leaving should announce a rest, and record where the
    /// player is headed. Returns `true` when a rest notice should be sent.
    pub fn leave(
        &mut self,
        reason: TeardownReason,
        connection_open: bool,
        next_path: Option<&str>,
    ) -> bool {
        if let Some(path) = next_path {
            self.history.visit(path);
        }
        let notify = reason == TeardownReason::Navigate && connection_open;
        info!(?reason, notify, "leaving game");
        notify
    }

    /// The next entry must fetch from the server whatever was handed over.
    pub fn on_liveness_lost(&mut self) {
        self.force_fresh = true;
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.history.store_mut()
    }

    /// Drop the stored credentials so the next start has to sign in again.
    pub fn forget_user(&mut self) {
        self.store_mut().remove(USER_KEY);
    }

    pub fn into_store(self) -> S {
        self.history.store
    }
}
