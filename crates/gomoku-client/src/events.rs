use std::collections::VecDeque;

use gomoku_core::protocol::GameStatus;

/// Maximum number of events kept in an [`EventLog`].
pub const EVENT_LOG_CAPACITY: usize = 100;

/// Semantic category for notifications. The frontend decides how to style each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    System,
    Presence,
    Move,
    Chat,
    Error,
}

/// Something the player should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    OpponentJoined { name: String },
    OpponentReentered { name: String },
    OpponentLeft { name: String },
    OpponentResting { name: String },
    OpponentMoved { name: String, index: usize },
    ChatReceived { name: String, message: String },
    MoveConfirmed { index: usize, status: GameStatus },
    MoveFailed { index: usize, reason: String },
    BoardReset,
    ResetFailed { reason: String },
    ChatFailed { reason: String },
    Disconnected,
    /// The watchdog saw no heartbeat; the session must be reloaded.
    LivenessLost,
    SessionExpired { reason: String },
    Text { text: String, category: LogCategory },
}

impl SessionEvent {
    pub fn category(&self) -> LogCategory {
        match self {
            Self::OpponentJoined { .. }
            | Self::OpponentReentered { .. }
            | Self::OpponentLeft { .. }
            | Self::OpponentResting { .. } => LogCategory::Presence,

            Self::OpponentMoved { .. } | Self::MoveConfirmed { .. } | Self::BoardReset => {
                LogCategory::Move
            }

            Self::ChatReceived { .. } => LogCategory::Chat,

            Self::MoveFailed { .. }
            | Self::ResetFailed { .. }
            | Self::ChatFailed { .. }
            | Self::SessionExpired { .. } => LogCategory::Error,

            Self::Disconnected | Self::LivenessLost => LogCategory::System,

            Self::Text { category, .. } => *category,
        }
    }

    /// Toast text for this event.
    pub fn describe(&self) -> String {
        match self {
            Self::OpponentJoined { name } => format!("{name} joined game"),
            Self::OpponentReentered { name } => format!("{name} re-entered game"),
            Self::OpponentLeft { name } => format!("{name} left game"),
            Self::OpponentResting { name } => format!("{name} taking rest"),
            Self::OpponentMoved { name, .. } => format!("{name}, made move"),
            Self::ChatReceived { name, message } => format!("{name}: {message}"),
            Self::MoveConfirmed { index, status } => match status {
                GameStatus::Active => format!("move at {index} confirmed"),
                GameStatus::Won => format!("move at {index} confirmed, game won"),
                GameStatus::Drawn => format!("move at {index} confirmed, game drawn"),
            },
            Self::MoveFailed { index, reason } => format!("move at {index} not confirmed: {reason}"),
            Self::BoardReset => "board reset".to_string(),
            Self::ResetFailed { reason } => format!("reset failed: {reason}"),
            Self::ChatFailed { reason } => format!("message not sent: {reason}"),
            Self::Disconnected => "connection closed".to_string(),
            Self::LivenessLost => "connection lost, reloading".to_string(),
            Self::SessionExpired { reason } => format!("session expired: {reason}"),
            Self::Text { text, .. } => text.clone(),
        }
    }
}

/// Describes what changed in the session after one call.
///
/// Frontends can inspect these flags to decide what to re-render. All flags
/// default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChanged {
    /// Positions or the move list changed.
    pub board: bool,
    pub turn: bool,
    pub status: bool,
    pub players: bool,
    pub chat: bool,
    /// The error banner was set or cleared.
    pub error: bool,
}

impl StateChanged {
    pub fn any(self) -> bool {
        self.board || self.turn || self.status || self.players || self.chat || self.error
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            board: self.board || other.board,
            turn: self.turn || other.turn,
            status: self.status || other.status,
            players: self.players || other.players,
            chat: self.chat || other.chat,
            error: self.error || other.error,
        }
    }
}

/// Bounded notification log, oldest entries dropped first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: VecDeque<SessionEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: SessionEvent) {
        self.events.push_back(event);
        if self.events.len() > EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
    }

    pub fn add_message(&mut self, text: String, category: LogCategory) {
        self.push(SessionEvent::Text { text, category });
    }

    pub fn last(&self) -> Option<&SessionEvent> {
        self.events.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return everything logged so far.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }
}
