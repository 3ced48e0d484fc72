//! Per-game realtime connection with liveness tracking.
//!
//! [`ConnectionManager`] owns the socket's background reader and writer tasks
//! (the same split as any [`Transport`]) and two timers:
//!
//! - a ping timeout, re-armed on every heartbeat addressed to us, that says
//!   goodbye and closes the socket when the server goes quiet;
//! - a periodic watchdog that reports lost liveness once per silence episode
//!   so the session can be rebuilt from scratch.

use gomoku_core::frames::FarewellFrame;
use gomoku_core::transport::{Transport, TransportError, TransportReader, TransportWriter};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::HeartbeatConfig;

// ---------------------------------------------------------------------------
// Heartbeat bookkeeping
// ---------------------------------------------------------------------------

/// Pure timer state behind the connection's liveness checks.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_heartbeat_at: Instant,
    ping_deadline: Option<Instant>,
    watchdog_armed: bool,
    /// Set once the watchdog has reported the current silence episode.
    liveness_reported: bool,
}

impl Heartbeat {
    /// Start tracking at `now`, with both timers armed.
    pub fn new(config: HeartbeatConfig, now: Instant) -> Self {
        Self {
            config,
            last_heartbeat_at: now,
            ping_deadline: Some(now + config.ping_timeout),
            watchdog_armed: true,
            liveness_reported: false,
        }
    }

    /// A heartbeat arrived: push the ping deadline out and end any silence episode.
    pub fn arm_ping_timeout(&mut self, now: Instant) {
        self.last_heartbeat_at = now;
        self.ping_deadline = Some(now + self.config.ping_timeout);
        self.liveness_reported = false;
    }

    pub fn disarm_ping_timeout(&mut self) {
        self.ping_deadline = None;
    }

    /// Stop both timers.
    pub fn disarm(&mut self) {
        self.ping_deadline = None;
        self.watchdog_armed = false;
    }

    pub fn ping_deadline(&self) -> Option<Instant> {
        self.ping_deadline
    }

    pub fn last_heartbeat_at(&self) -> Instant {
        self.last_heartbeat_at
    }

    pub fn is_watchdog_armed(&self) -> bool {
        self.watchdog_armed
    }

    /// Watchdog tick. Returns `true` the first time the last heartbeat is
    /// older than the liveness threshold.
    pub fn watchdog_check(&mut self, now: Instant) -> bool {
        if !self.watchdog_armed || self.liveness_reported {
            return false;
        }
        if now.saturating_duration_since(self.last_heartbeat_at) > self.config.liveness_threshold {
            self.liveness_reported = true;
            return true;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Connection manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// What [`ConnectionManager::recv`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A raw text frame, not yet decoded.
    Frame(String),
    /// No heartbeat within the ping timeout; the socket has been closed.
    PingTimedOut,
    /// The watchdog saw a stale heartbeat. The session should be reloaded.
    LivenessLost,
    /// The server closed the socket.
    Closed,
}

enum Outgoing {
    Text(String),
    Close,
}

pub struct ConnectionManager {
    user_id: String,
    state: ConnectionState,
    heartbeat: Heartbeat,
    watchdog: Interval,
    /// `None` once the socket is closed.
    incoming: Option<mpsc::UnboundedReceiver<String>>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl ConnectionManager {
    /// Run a connection over any [`Transport`], spawning its I/O tasks.
    ///
    /// Must be called from within a Tokio runtime. The ping timeout is armed
    /// immediately so a server that never pings is still detected.
    pub fn from_transport<T: Transport>(
        transport: T,
        user_id: impl Into<String>,
        config: HeartbeatConfig,
    ) -> Self {
        let (reader, writer) = transport.split();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Self::spawn_reader_task(reader, frame_tx);
        Self::spawn_writer_task(writer, out_rx);

        let now = Instant::now();
        let mut watchdog =
            tokio::time::interval_at(now + config.watchdog_period, config.watchdog_period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            user_id: user_id.into(),
            state: ConnectionState::Open,
            heartbeat: Heartbeat::new(config, now),
            watchdog,
            incoming: Some(frame_rx),
            outgoing: out_tx,
        }
    }

    /// Open the game's WebSocket, authenticating with `token`.
    #[cfg(feature = "native")]
    pub async fn connect(
        config: &crate::config::ClientConfig,
        game_id: &str,
        user_id: &str,
    ) -> Result<Self, TransportError> {
        use gomoku_core::ws_transport::{WsTransport, game_socket_url};

        let url = game_socket_url(&config.websocket_base(), game_id);
        info!(%url, "connecting");
        let transport = WsTransport::connect(&url, &config.token).await?;
        Ok(Self::from_transport(transport, user_id, config.heartbeat))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// A ping addressed to us arrived.
    pub fn record_ping(&mut self) {
        self.heartbeat.arm_ping_timeout(Instant::now());
    }

    /// Queue a text frame for the writer task.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    pub fn send_json<T: Serialize>(&self, frame: &T) -> Result<(), TransportError> {
        let text = serde_json::to_string(frame).map_err(|e| TransportError::Io(e.to_string()))?;
        self.send_text(text)
    }

    /// Close the socket and stop both timers. Idempotent.
    pub fn close(&mut self) {
        self.heartbeat.disarm();
        self.shutdown_socket();
    }

    /// Wait for the next frame or timer event.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn recv(&mut self) -> ConnectionEvent {
        loop {
            let deadline = self.heartbeat.ping_deadline();
            let watchdog_armed = self.heartbeat.is_watchdog_armed();

            tokio::select! {
                frame = next_frame(&mut self.incoming) => match frame {
                    Some(text) => return ConnectionEvent::Frame(text),
                    None => {
                        info!("server closed the connection");
                        self.incoming = None;
                        self.heartbeat.disarm_ping_timeout();
                        self.state = ConnectionState::Closed;
                        return ConnectionEvent::Closed;
                    }
                },
                () = sleep_until(deadline) => {
                    warn!(user_id = %self.user_id, "no heartbeat, closing connection");
                    self.heartbeat.disarm_ping_timeout();
                    if let Err(e) = self.send_json(&FarewellFrame::new(self.user_id.clone())) {
                        debug!(error = %e, "farewell not sent");
                    }
                    self.shutdown_socket();
                    return ConnectionEvent::PingTimedOut;
                }
                _ = self.watchdog.tick(), if watchdog_armed => {
                    if self.heartbeat.watchdog_check(Instant::now()) {
                        warn!(user_id = %self.user_id, "heartbeat is stale, session needs reload");
                        return ConnectionEvent::LivenessLost;
                    }
                }
            }
        }
    }

    fn shutdown_socket(&mut self) {
        if matches!(self.state, ConnectionState::Closing | ConnectionState::Closed) {
            return;
        }
        self.state = ConnectionState::Closing;
        let _ = self.outgoing.send(Outgoing::Close);
        self.incoming = None;
        self.state = ConnectionState::Closed;
    }

    // ------------------------------------------------------------------
    // Background task spawners
    // ------------------------------------------------------------------

    fn spawn_reader_task<R: TransportReader>(
        mut reader: R,
        frame_tx: mpsc::UnboundedSender<String>,
    ) {
        tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(text)) => {
                        if frame_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "socket read failed");
                        break;
                    }
                }
            }
            // Dropping the sender signals the close to `recv`.
        });
    }

    fn spawn_writer_task<W: TransportWriter>(
        mut writer: W,
        mut out_rx: mpsc::UnboundedReceiver<Outgoing>,
    ) {
        tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                match out {
                    Outgoing::Text(text) => {
                        if let Err(e) = writer.send(&text).await {
                            debug!(error = %e, "socket write failed");
                            break;
                        }
                    }
                    Outgoing::Close => {
                        if let Err(e) = writer.close().await {
                            debug!(error = %e, "socket close failed");
                        }
                        break;
                    }
                }
            }
        });
    }
}

async fn next_frame(incoming: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match incoming {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gomoku_core::transport::{MemoryTransport, PeerFrame};

    use super::*;

    fn ping(user: &str) -> String {
        format!(r#"{{"action":"ping","userId":"{user}"}}"#)
    }

    #[test]
    fn watchdog_reports_once_per_silence() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(HeartbeatConfig::default(), start);
        assert!(!hb.watchdog_check(start + Duration::from_secs(10)));
        assert!(hb.watchdog_check(start + Duration::from_secs(20)));
        assert!(!hb.watchdog_check(start + Duration::from_secs(30)));

        hb.arm_ping_timeout(start + Duration::from_secs(31));
        assert!(!hb.watchdog_check(start + Duration::from_secs(40)));
        assert!(hb.watchdog_check(start + Duration::from_secs(50)));
    }

    #[test]
    fn disarm_stops_both_timers() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(HeartbeatConfig::default(), start);
        hb.disarm();
        assert_eq!(hb.ping_deadline(), None);
        assert!(!hb.watchdog_check(start + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out_then_loses_liveness() {
        let (transport, mut peer) = MemoryTransport::pair();
        let mut conn = ConnectionManager::from_transport(transport, "u1", HeartbeatConfig::default());
        let start = Instant::now();

        assert_eq!(conn.recv().await, ConnectionEvent::PingTimedOut);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(11) && waited < Duration::from_secs(12));
        assert_eq!(conn.state(), ConnectionState::Closed);

        let farewell = peer.from_client.recv().await;
        assert_eq!(
            farewell,
            Some(PeerFrame::Text(r#"{"action":"bye","userId":"u1"}"#.into()))
        );
        assert_eq!(peer.from_client.recv().await, Some(PeerFrame::Close));

        // The watchdog keeps running after the socket is gone.
        assert_eq!(conn.recv().await, ConnectionEvent::LivenessLost);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(20) && waited < Duration::from_secs(21));

        // Reported once for this silence episode.
        let again = tokio::time::timeout(Duration::from_secs(60), conn.recv()).await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn regular_pings_keep_the_connection_alive() {
        let (transport, peer) = MemoryTransport::pair();
        let mut conn = ConnectionManager::from_transport(transport, "u1", HeartbeatConfig::default());

        for _ in 0..8 {
            tokio::time::sleep(Duration::from_secs(5)).await;
            peer.to_client.send(ping("u1")).unwrap();
            assert_eq!(conn.recv().await, ConnectionEvent::Frame(ping("u1")));
            conn.record_ping();
        }
        assert!(conn.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_close_stops_everything() {
        let (transport, mut peer) = MemoryTransport::pair();
        let mut conn = ConnectionManager::from_transport(transport, "u1", HeartbeatConfig::default());

        conn.close();
        conn.close();
        assert_eq!(peer.from_client.recv().await, Some(PeerFrame::Close));
        assert!(conn.send_text("late".into()).is_err());

        let next = tokio::time::timeout(Duration::from_secs(120), conn.recv()).await;
        assert!(next.is_err(), "no timer may fire after close");
    }

    #[tokio::test]
    async fn server_close_is_reported() {
        let (transport, peer) = MemoryTransport::pair();
        let mut conn = ConnectionManager::from_transport(transport, "u1", HeartbeatConfig::default());

        peer.to_client.send("hello".into()).unwrap();
        drop(peer);
        assert_eq!(conn.recv().await, ConnectionEvent::Frame("hello".into()));
        assert_eq!(conn.recv().await, ConnectionEvent::Closed);
        assert!(!conn.is_open());
    }
}
