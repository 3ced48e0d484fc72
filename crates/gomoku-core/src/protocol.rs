//! REST wire types shared by the engine and any frontend.
//!
//! Field names follow the server's camelCase JSON and enum values are the
//! server's UPPERCASE strings. Realtime frames live in [`crate::frames`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stone colour, also used as the "player" label the server sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Color::Black => "BLACK",
            Color::White => "WHITE",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of a single board cell.
///
/// `Pending` is client-only: a move was sent but never confirmed. The server
/// never reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    None,
    Black,
    White,
    #[serde(rename = "YELLOW")]
    Pending,
}

impl PositionStatus {
    /// The stone on this cell, if a confirmed or optimistic colour is present.
    pub fn stone(self) -> Option<Color> {
        match self {
            PositionStatus::Black => Some(Color::Black),
            PositionStatus::White => Some(Color::White),
            PositionStatus::None | PositionStatus::Pending => None,
        }
    }

    pub fn is_empty(self) -> bool {
        self == PositionStatus::None
    }
}

impl From<Color> for PositionStatus {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => PositionStatus::Black,
            Color::White => PositionStatus::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameStatus {
    Active,
    Won,
    Drawn,
}

/// Presence transitions a client can announce over REST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresenceAction {
    Rest,
    Leave,
    Join,
}

impl fmt::Display for PresenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PresenceAction::Rest => "REST",
            PresenceAction::Leave => "LEAVE",
            PresenceAction::Join => "JOIN",
        })
    }
}

/// A registered player as the server describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    pub user_id: String,
    #[serde(alias = "username")]
    pub user_name: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: PositionStatus,
}

/// Full snapshot of a game, as returned by `GET /api/game/{id}`,
/// `GET /api/game-log/{id}`, `POST /api` and the reset `PUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub game_number: u32,
    /// `[rows, cols]`
    pub size: [usize; 2],
    pub status: GameStatus,
    pub positions: Vec<PositionInfo>,
    #[serde(default)]
    pub selected_positions: Vec<usize>,
    #[serde(default)]
    pub is_multi: bool,
    #[serde(default)]
    pub players: Vec<PlayerDetail>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Seat entry in the in-progress game listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    pub user_id: String,
    pub color: Color,
}

/// Entry of `GET /api`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub game_number: u32,
    pub size: [usize; 2],
    #[serde(default)]
    pub is_multi: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub players: Vec<SeatInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPosition {
    pub status: PositionStatus,
}

/// Entry of `GET /api/games`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGame {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub game_number: u32,
    pub status: GameStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_selected_position: Option<LastPosition>,
}

/// Reply to a move submission: the authoritative status and next player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReply {
    pub status: GameStatus,
    pub player: Color,
}

/// Bodies accepted by `PUT /api/game/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GameUpdate {
    /// Place a stone on the position with this id.
    Move { id: String },
    /// Persist a chat message.
    Chat { msg: String },
    Presence { action: PresenceAction },
    /// Clear the board; always `NONE`.
    Reset { status: PositionStatus },
}

impl GameUpdate {
    pub fn reset() -> Self {
        GameUpdate::Reset {
            status: PositionStatus::None,
        }
    }
}

/// Body of `POST /api`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub size: [usize; 2],
    pub is_multi: bool,
}

/// Error payload shapes the server is known to produce.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_uses_yellow_on_the_wire() {
        let json = serde_json::to_string(&PositionStatus::Pending).unwrap();
        assert_eq!(json, "\"YELLOW\"");
        let back: PositionStatus = serde_json::from_str("\"YELLOW\"").unwrap();
        assert_eq!(back, PositionStatus::Pending);
    }

    #[test]
    fn update_bodies_match_server_shapes() {
        let mv = serde_json::to_value(GameUpdate::Move { id: "p1".into() }).unwrap();
        assert_eq!(mv, serde_json::json!({ "id": "p1" }));

        let rest = serde_json::to_value(GameUpdate::Presence {
            action: PresenceAction::Rest,
        })
        .unwrap();
        assert_eq!(rest, serde_json::json!({ "action": "REST" }));

        let reset = serde_json::to_value(GameUpdate::reset()).unwrap();
        assert_eq!(reset, serde_json::json!({ "status": "NONE" }));
    }

    #[test]
    fn snapshot_parses_server_document() {
        let raw = r#"{
            "_id": "g1",
            "userId": "u1",
            "gameNumber": 7,
            "size": [2, 2],
            "status": "ACTIVE",
            "positions": [
                {"_id": "a", "status": "BLACK"},
                {"_id": "b", "status": "NONE"},
                {"_id": "c", "status": "NONE"},
                {"_id": "d", "status": "NONE"}
            ],
            "selectedPositions": [0],
            "isMulti": true,
            "players": [{"userId": "u1", "userName": "ann", "color": "BLACK"}],
            "createdAt": "2024-01-01T00:00:00.000Z"
        }"#;
        let snap: GameSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snap.size, [2, 2]);
        assert_eq!(snap.positions[0].status, PositionStatus::Black);
        assert_eq!(snap.players[0].color, Color::Black);
        assert!(snap.is_multi);
    }

    #[test]
    fn error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Invalid token","message":"x"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid token"));
    }
}
