//! Game session orchestrator.
//!
//! [`GameController`] owns the session, its connection and the optimistic
//! coordinators. Frontends call the action methods and drive
//! [`GameController::recv`] in their event loop; every state change flows
//! through here.

use gomoku_core::protocol::{Color, GameSnapshot, MoveReply, PresenceAction};
use gomoku_core::session::GameSession;
use gomoku_core::transport::TransportError;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, GameApi};
use crate::chat::{ChatRejected, ChatRelay};
use crate::config::Identity;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::events::{EventLog, LogCategory, SessionEvent, StateChanged};
use crate::moves::{MoveCoordinator, MovePhase, MoveRejected, RETRY_MESSAGE};
use crate::presence::{EntryPlan, KeyValueStore, PresenceBridge, TeardownReason};
use crate::router::{EventRouter, Routed};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("game {0} not found")]
    GameNotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ControllerError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ControllerError::Api(e) if e.is_auth())
    }
}

/// Result of polling the controller for the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// Something was applied; the flags describe what.
    Updated(StateChanged),
    /// The socket is closed. Frames no longer arrive but the session is intact.
    Disconnected,
    /// Liveness was lost. Tear down with [`TeardownReason::Reload`] and enter again.
    ReloadRequired,
    /// The server rejected our credentials. Tear down with
    /// [`TeardownReason::SessionExpired`] and log in again.
    SessionExpired,
}

/// Outcome of a request running in the background.
enum Completion {
    Move(Result<MoveReply, ApiError>),
    Reset(Result<GameSnapshot, ApiError>),
    Chat(Result<(), ApiError>),
}

/// Resolve a game's initial session, recording the visit.
///
/// A fresh load first checks that the game is still listed as active.
pub async fn load_session<A: GameApi, S: KeyValueStore>(
    api: &A,
    presence: &mut PresenceBridge<S>,
    game_id: &str,
    handoff: Option<GameSnapshot>,
) -> Result<GameSession, ControllerError> {
    match presence.enter(game_id, handoff) {
        EntryPlan::UseHandoff(snapshot) => Ok(GameSession::from_snapshot(snapshot)),
        EntryPlan::FetchFresh => {
            let active = api.list_active().await?;
            if !active.iter().any(|g| g.id == game_id) {
                return Err(ControllerError::GameNotFound(game_id.to_string()));
            }
            let snapshot = api.fetch_game(game_id).await?;
            Ok(GameSession::from_snapshot(snapshot))
        }
    }
}

pub struct GameController<A, S> {
    api: A,
    identity: Identity,
    session: GameSession,
    connection: ConnectionManager,
    router: EventRouter,
    moves: MoveCoordinator,
    chat: ChatRelay,
    presence: PresenceBridge<S>,
    events: EventLog,
    error_message: Option<String>,
    expired: bool,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<A: GameApi, S: KeyValueStore> GameController<A, S> {
    pub fn new(
        api: A,
        identity: Identity,
        session: GameSession,
        connection: ConnectionManager,
        presence: PresenceBridge<S>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        info!(game_id = %session.id, user_id = %identity.user_id, "session started");
        Self {
            router: EventRouter::new(identity.user_id.clone()),
            api,
            identity,
            session,
            connection,
            moves: MoveCoordinator::new(),
            chat: ChatRelay::new(),
            presence,
            events: EventLog::default(),
            error_message: None,
            expired: false,
            completion_tx,
            completion_rx,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take every event logged since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn move_phase(&self) -> MovePhase {
        self.moves.phase()
    }

    /// Whether a move or reset is waiting for the server.
    pub fn is_updating(&self) -> bool {
        self.moves.is_updating()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Our stone colour, if seated.
    pub fn local_color(&self) -> Option<Color> {
        self.session.slot(&self.identity.user_id).map(|p| p.color)
    }

    pub fn is_my_turn(&self) -> bool {
        if !self.session.is_active() {
            return false;
        }
        if !self.session.is_multi {
            return true;
        }
        self.local_color() == Some(self.session.current_player)
    }

    /// A restart is offered only while playing alone in an active game.
    pub fn can_restart(&self) -> bool {
        self.session.is_active() && self.session.players.len() <= 1 && !self.moves.is_updating()
    }

    /// Append a local feedback message to the event log.
    pub fn add_message(&mut self, text: String, category: LogCategory) {
        self.events.add_message(text, category);
    }

    pub fn dismiss_error(&mut self) {
        self.error_message = None;
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Place a stone on `index`. The board updates immediately; the outcome
    /// arrives through [`Self::recv`].
    pub fn submit_move(&mut self, index: usize) -> Result<StateChanged, MoveRejected> {
        if self.expired {
            return Err(MoveRejected::SessionExpired);
        }
        let attempt = self
            .moves
            .begin_move(&mut self.session, index, &self.identity.user_id)?;
        let had_error = self.error_message.take().is_some();
        debug!(index, position = %attempt.position_id, color = %attempt.color, "submitting move");

        let api = self.api.clone();
        let tx = self.completion_tx.clone();
        let game_id = self.session.id.clone();
        tokio::spawn(async move {
            let result = api.submit_move(&game_id, &attempt.position_id).await;
            let _ = tx.send(Completion::Move(result));
        });

        Ok(StateChanged {
            board: true,
            error: had_error,
            ..Default::default()
        })
    }

    /// Clear the board. Only allowed while playing alone.
    pub fn reset_game(&mut self) -> Result<StateChanged, MoveRejected> {
        if self.expired {
            return Err(MoveRejected::SessionExpired);
        }
        self.moves.begin_reset(&mut self.session)?;
        let had_error = self.error_message.take().is_some();
        debug!(game_id = %self.session.id, "resetting board");

        let api = self.api.clone();
        let tx = self.completion_tx.clone();
        let game_id = self.session.id.clone();
        tokio::spawn(async move {
            let result = api.reset(&game_id).await;
            let _ = tx.send(Completion::Reset(result));
        });

        Ok(StateChanged {
            board: true,
            turn: true,
            error: had_error,
            ..Default::default()
        })
    }

    /// Post a chat line. It shows immediately and is withdrawn if the server
    /// refuses it.
    pub fn send_chat(&mut self, text: &str) -> Result<StateChanged, ChatRejected> {
        if self.expired {
            return Err(ChatRejected::SessionExpired);
        }
        let attempt = self
            .chat
            .begin_send(&mut self.session, &self.identity, text)?;

        let api = self.api.clone();
        let tx = self.completion_tx.clone();
        let game_id = self.session.id.clone();
        tokio::spawn(async move {
            let result = api.send_chat(&game_id, &attempt.message.message).await;
            let _ = tx.send(Completion::Chat(result));
        });

        Ok(StateChanged {
            chat: true,
            ..Default::default()
        })
    }

    /// Take a free seat, then refresh the board and roster.
    pub async fn join(&mut self) -> Result<StateChanged, ControllerError> {
        let game_id = self.session.id.clone();
        if let Err(e) = self.api.presence(&game_id, PresenceAction::Join).await {
            return Err(self.api_failure(e));
        }
        match self.api.fetch_game(&game_id).await {
            Ok(snapshot) => {
                self.session.adopt_board(snapshot);
                Ok(StateChanged {
                    board: true,
                    turn: true,
                    status: true,
                    players: true,
                    ..Default::default()
                })
            }
            Err(e) => Err(self.api_failure(e)),
        }
    }

    /// Wait for the next background completion or connection event.
    ///
    /// Once the credentials were rejected this returns
    /// [`PollResult::SessionExpired`] straight away, whichever call noticed it.
    pub async fn recv(&mut self) -> PollResult {
        if self.expired {
            return PollResult::SessionExpired;
        }
        tokio::select! {
            Some(done) = self.completion_rx.recv() => self.handle_completion(done),
            event = self.connection.recv() => self.handle_connection_event(event),
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Give up the seat and end the session.
    pub async fn leave(self) -> PresenceBridge<S> {
        if !self.expired
            && let Err(e) = self
                .api
                .presence(&self.session.id, PresenceAction::Leave)
                .await
        {
            warn!(error = %e, "leave notice failed");
        }
        self.teardown(TeardownReason::Leave, Some("/")).await
    }

    /// Announce a rest once, drop the stored credentials and end the
    /// session. Teardown sends nothing further.
    pub async fn logout(self) -> PresenceBridge<S> {
        if !self.expired
            && let Err(e) = self
                .api
                .presence(&self.session.id, PresenceAction::Rest)
                .await
        {
            warn!(error = %e, "rest notice failed");
        }
        let mut bridge = self.teardown(TeardownReason::Logout, Some("/")).await;
        bridge.forget_user();
        bridge
    }

    /// End the session: send a rest notice if the reason calls for one, close
    /// the socket and stop its timers. Returns the presence bridge for the
    /// next entry.
    pub async fn teardown(
        mut self,
        reason: TeardownReason,
        next_path: Option<&str>,
    ) -> PresenceBridge<S> {
        let reason = if self.expired {
            TeardownReason::SessionExpired
        } else {
            reason
        };
        let notify = self
            .presence
            .leave(reason, self.connection.is_open(), next_path);
        if notify
            && let Err(e) = self
                .api
                .presence(&self.session.id, PresenceAction::Rest)
                .await
        {
            warn!(error = %e, "rest notice failed");
        }
        self.connection.close();
        if reason == TeardownReason::Reload {
            self.presence.on_liveness_lost();
        }
        info!(game_id = %self.session.id, ?reason, "session ended");
        self.presence
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    fn handle_connection_event(&mut self, event: ConnectionEvent) -> PollResult {
        match event {
            ConnectionEvent::Frame(text) => match self.router.route_text(&mut self.session, &text)
            {
                Routed::Heartbeat => {
                    self.connection.record_ping();
                    PollResult::Updated(StateChanged::default())
                }
                Routed::Applied { changed, event } => {
                    if let Some(event) = event {
                        self.events.push(event);
                    }
                    PollResult::Updated(changed)
                }
                Routed::Ignored => PollResult::Updated(StateChanged::default()),
            },
            ConnectionEvent::PingTimedOut | ConnectionEvent::Closed => {
                self.events.push(SessionEvent::Disconnected);
                PollResult::Disconnected
            }
            ConnectionEvent::LivenessLost => {
                self.events.push(SessionEvent::LivenessLost);
                PollResult::ReloadRequired
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) -> PollResult {
        match done {
            Completion::Move(Ok(reply)) => {
                let Some(attempt) = self.moves.confirm_move(&mut self.session, reply) else {
                    return PollResult::Updated(StateChanged::default());
                };
                self.events.push(SessionEvent::MoveConfirmed {
                    index: attempt.index,
                    status: reply.status,
                });
                PollResult::Updated(StateChanged {
                    turn: true,
                    status: true,
                    ..Default::default()
                })
            }
            Completion::Move(Err(e)) => {
                let Some(attempt) = self.moves.fail_move(&mut self.session) else {
                    return PollResult::Updated(StateChanged::default());
                };
                warn!(index = attempt.index, error = %e, "move not confirmed");
                self.events.push(SessionEvent::MoveFailed {
                    index: attempt.index,
                    reason: e.to_string(),
                });
                self.error_message = Some(RETRY_MESSAGE.to_string());
                self.settle_failure(
                    &e,
                    StateChanged {
                        board: true,
                        turn: true,
                        error: true,
                        ..Default::default()
                    },
                )
            }
            Completion::Reset(Ok(snapshot)) => {
                if !self.moves.confirm_reset(&mut self.session, snapshot) {
                    return PollResult::Updated(StateChanged::default());
                }
                self.events.push(SessionEvent::BoardReset);
                PollResult::Updated(StateChanged {
                    board: true,
                    turn: true,
                    status: true,
                    ..Default::default()
                })
            }
            Completion::Reset(Err(e)) => {
                if !self.moves.fail_reset(&mut self.session) {
                    return PollResult::Updated(StateChanged::default());
                }
                warn!(error = %e, "reset failed");
                self.events.push(SessionEvent::ResetFailed {
                    reason: e.to_string(),
                });
                self.error_message = Some(e.to_string());
                self.settle_failure(
                    &e,
                    StateChanged {
                        board: true,
                        turn: true,
                        error: true,
                        ..Default::default()
                    },
                )
            }
            Completion::Chat(Ok(())) => {
                if let Some(attempt) = self.chat.confirm()
                    && let Err(e) = self.connection.send_json(&attempt.frame())
                {
                    debug!(error = %e, "chat stored but not relayed");
                }
                PollResult::Updated(StateChanged::default())
            }
            Completion::Chat(Err(e)) => {
                if self.chat.fail(&mut self.session).is_none() {
                    return PollResult::Updated(StateChanged::default());
                }
                warn!(error = %e, "chat not sent");
                self.events.push(SessionEvent::ChatFailed {
                    reason: e.to_string(),
                });
                self.error_message = Some(e.to_string());
                self.settle_failure(
                    &e,
                    StateChanged {
                        chat: true,
                        error: true,
                        ..Default::default()
                    },
                )
            }
        }
    }

    /// Turn a failed request into a poll result, expiring the session on an
    /// authentication error.
    fn settle_failure(&mut self, error: &ApiError, changed: StateChanged) -> PollResult {
        if error.is_auth() {
            self.expire(error.to_string());
            return PollResult::SessionExpired;
        }
        PollResult::Updated(changed)
    }

    fn api_failure(&mut self, error: ApiError) -> ControllerError {
        if error.is_auth() {
            self.expire(error.to_string());
        }
        ControllerError::Api(error)
    }

    /// Abandon the session without notifying the server.
    fn expire(&mut self, reason: String) {
        if self.expired {
            return;
        }
        warn!(%reason, "credentials rejected, ending session");
        self.expired = true;
        self.events.push(SessionEvent::SessionExpired { reason });
        self.connection.close();
    }
}
