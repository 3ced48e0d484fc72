//! Client configuration: endpoints, credentials and heartbeat timings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::presence::{KeyValueStore, USER_KEY};

/// How long after the last ping the connection is considered dead.
pub const PING_TIMEOUT: Duration = Duration::from_secs(11);

/// How often the watchdog inspects the last heartbeat.
pub const WATCHDOG_PERIOD: Duration = Duration::from_secs(10);

/// Heartbeat age beyond which the watchdog reports lost liveness.
pub const LIVENESS_THRESHOLD: Duration = Duration::from_secs(11);

/// Socket base used when no API host is configured.
pub const DEFAULT_WS_BASE: &str = "ws://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub ping_timeout: Duration,
    pub watchdog_period: Duration,
    pub liveness_threshold: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_timeout: PING_TIMEOUT,
            watchdog_period: WATCHDOG_PERIOD,
            liveness_threshold: LIVENESS_THRESHOLD,
        }
    }
}

/// The local user as the server knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// Credentials remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub user_id: String,
    pub user_name: String,
    pub token: String,
}

impl StoredUser {
    /// Read the remembered user. A corrupt entry is discarded.
    pub fn load<S: KeyValueStore>(store: &mut S) -> Option<Self> {
        let raw = store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored user");
                store.remove(USER_KEY);
                None
            }
        }
    }

    pub fn save<S: KeyValueStore>(&self, store: &mut S) {
        match serde_json::to_string(self) {
            Ok(raw) => store.set(USER_KEY, &raw),
            Err(e) => warn!(error = %e, "could not encode user"),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.user_name.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST host, e.g. `https://gomoku.example`. Empty means same-origin dev.
    pub api_base: String,
    /// Explicit socket base; derived from `api_base` when `None`.
    pub ws_base: Option<String>,
    pub token: String,
    pub heartbeat: HeartbeatConfig,
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ws_base: None,
            token: token.into(),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    pub fn with_ws_base(mut self, ws_base: impl Into<String>) -> Self {
        self.ws_base = Some(ws_base.into());
        self
    }

    pub fn websocket_base(&self) -> String {
        match &self.ws_base {
            Some(base) => base.clone(),
            None => derive_ws_base(&self.api_base),
        }
    }
}

/// Socket base for an API host: `https` maps to `wss`, anything else to `ws`,
/// and only the hostname is kept.
pub fn derive_ws_base(api_base: &str) -> String {
    let api_base = api_base.trim();
    if api_base.is_empty() {
        return DEFAULT_WS_BASE.to_string();
    }
    let (scheme, rest) = match api_base.split_once("://") {
        Some(("https", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", api_base),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let hostname = if host.starts_with('[') {
        host.split_inclusive(']').next().unwrap_or(host)
    } else {
        host.split(':').next().unwrap_or(host)
    };
    format!("{scheme}://{hostname}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::MemoryStore;

    #[test]
    fn derives_socket_base_from_api_host() {
        assert_eq!(derive_ws_base("https://gomoku.example"), "wss://gomoku.example");
        assert_eq!(derive_ws_base("http://localhost:3000/"), "ws://localhost");
        assert_eq!(derive_ws_base("http://[::1]:3000"), "ws://[::1]");
        assert_eq!(derive_ws_base(""), DEFAULT_WS_BASE);
    }

    #[test]
    fn explicit_socket_base_wins() {
        let config = ClientConfig::new("https://a.example/", "t").with_ws_base("ws://b:9000");
        assert_eq!(config.api_base, "https://a.example");
        assert_eq!(config.websocket_base(), "ws://b:9000");
    }

    #[test]
    fn stored_user_survives_and_corruption_is_dropped() {
        let mut store = MemoryStore::default();
        assert_eq!(StoredUser::load(&mut store), None);

        let user = StoredUser {
            user_id: "u1".into(),
            user_name: "ann".into(),
            token: "t0k".into(),
        };
        user.save(&mut store);
        assert_eq!(StoredUser::load(&mut store), Some(user));

        store.set(USER_KEY, "{broken");
        assert_eq!(StoredUser::load(&mut store), None);
        assert_eq!(store.get(USER_KEY), None);
    }

    #[test]
    fn default_heartbeat_timings() {
        let hb = HeartbeatConfig::default();
        assert_eq!(hb.ping_timeout, Duration::from_secs(11));
        assert_eq!(hb.watchdog_period, Duration::from_secs(10));
        assert_eq!(hb.liveness_threshold, Duration::from_secs(11));
    }
}
