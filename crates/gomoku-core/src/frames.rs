//! Realtime frames exchanged over the per-game WebSocket.
//!
//! Inbound traffic is a closed union keyed by the `action` field, with one
//! untagged shape for chat. [`decode`] is the only way in: it validates the
//! payload and rejects anything it does not recognise instead of guessing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Color, GameStatus, PlayerDetail};

/// Actions the decoder accepts.
pub const KNOWN_ACTIONS: &[&str] = &["ping", "JOIN", "REENTER", "LEAVE", "REST", "MOVE"];

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("unknown action {0}")]
    UnknownAction(String),

    #[error("malformed {} frame: {source}", .action.as_deref().unwrap_or("chat"))]
    Shape {
        action: Option<String>,
        #[source]
        source: serde_json::Error,
    },
}

/// Presence notification payload (`JOIN`, `REENTER`, `LEAVE`, `REST`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceFrame {
    #[serde(default)]
    pub players: Vec<PlayerDetail>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// An opponent's confirmed move.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFrame {
    pub selected_pos_id: String,
    #[serde(alias = "selectedPosIndex")]
    pub selected_position_index: usize,
    pub status: GameStatus,
    /// Whose turn it is after this move.
    pub player: Color,
    #[serde(default)]
    pub players: Vec<PlayerDetail>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Chat line. The same shape is used in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFrame {
    pub user_id: String,
    pub user_name: String,
    pub message: String,
}

/// Every inbound frame the engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action")]
pub enum InboundFrame {
    /// Server heartbeat echoing the user it was addressed to.
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "JOIN")]
    Join(PresenceFrame),
    #[serde(rename = "REENTER")]
    Reenter(PresenceFrame),
    #[serde(rename = "LEAVE")]
    Leave(PresenceFrame),
    #[serde(rename = "REST")]
    Rest(PresenceFrame),
    #[serde(rename = "MOVE")]
    Move(MoveFrame),
    /// Untagged chat shape; produced by [`decode`] only.
    #[serde(skip_deserializing)]
    Chat(ChatFrame),
}

impl InboundFrame {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Ping { .. } => "ping",
            InboundFrame::Join(_) => "JOIN",
            InboundFrame::Reenter(_) => "REENTER",
            InboundFrame::Leave(_) => "LEAVE",
            InboundFrame::Rest(_) => "REST",
            InboundFrame::Move(_) => "MOVE",
            InboundFrame::Chat(_) => "chat",
        }
    }
}

/// Validate and decode one text frame.
pub fn decode(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(FrameError::NotJson)?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }

    let action = match value.get("action") {
        Some(Value::String(action)) => Some(action.clone()),
        Some(other) => return Err(FrameError::UnknownAction(other.to_string())),
        None => None,
    };

    match action {
        Some(action) => {
            if !KNOWN_ACTIONS.contains(&action.as_str()) {
                return Err(FrameError::UnknownAction(action));
            }
            serde_json::from_value(value).map_err(|source| FrameError::Shape {
                action: Some(action),
                source,
            })
        }
        None => serde_json::from_value::<ChatFrame>(value)
            .map(InboundFrame::Chat)
            .map_err(|source| FrameError::Shape {
                action: None,
                source,
            }),
    }
}

/// Sent right before the client gives up on a silent connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarewellFrame {
    pub action: &'static str,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl FarewellFrame {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            action: "bye",
            user_id: user_id.into(),
        }
    }
}
