//! The client-side game session: board, players, chat and the current turn.
//!
//! A [`GameSession`] is owned by whoever renders the game. It is replaced
//! wholesale from a [`GameSnapshot`] and patched incrementally by confirmed
//! or optimistic moves. The board and `selected_positions` must always agree:
//! every non-`None` cell has exactly one entry in `selected_positions`.

use crate::protocol::{
    Color, GameSnapshot, GameStatus, PlayerDetail, PositionInfo, PositionStatus,
};
use crate::turn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPosition {
    pub id: String,
    pub status: PositionStatus,
}

impl From<PositionInfo> for BoardPosition {
    fn from(info: PositionInfo) -> Self {
        Self {
            id: info.id,
            status: info.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub user_id: String,
    pub user_name: String,
    pub color: Color,
}

impl From<PlayerDetail> for PlayerSlot {
    fn from(p: PlayerDetail) -> Self {
        Self {
            user_id: p.user_id,
            user_name: p.user_name,
            color: p.color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user_id: String,
    pub user_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub id: String,
    pub game_number: u32,
    pub rows: usize,
    pub cols: usize,
    pub positions: Vec<BoardPosition>,
    /// Indices into `positions`, in the order the stones were placed.
    pub selected_positions: Vec<usize>,
    pub status: GameStatus,
    pub is_multi: bool,
    /// Registration order; the first slot opens a multiplayer game.
    pub players: Vec<PlayerSlot>,
    /// Arrival order, not sender clock order.
    pub messages: Vec<ChatMessage>,
    /// Colour to move next, or the winner's colour once the game is over.
    pub current_player: Color,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl GameSession {
    /// Build a session from a server snapshot.
    ///
    /// `current_player` is inferred from the board here; it is a placeholder
    /// until the server names the next player.
    pub fn from_snapshot(snapshot: GameSnapshot) -> Self {
        let [rows, cols] = snapshot.size;
        let mut session = Self {
            id: snapshot.id,
            game_number: snapshot.game_number,
            rows,
            cols,
            positions: snapshot.positions.into_iter().map(Into::into).collect(),
            selected_positions: snapshot.selected_positions,
            status: snapshot.status,
            is_multi: snapshot.is_multi,
            players: snapshot.players.into_iter().map(Into::into).collect(),
            messages: Vec::new(),
            current_player: Color::Black,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        };
        session.current_player = turn::whose_turn(&session);
        session
    }

    /// Adopt a fresh board from the server, keeping the chat log.
    pub fn adopt_board(&mut self, snapshot: GameSnapshot) {
        let messages = std::mem::take(&mut self.messages);
        *self = Self::from_snapshot(snapshot);
        self.messages = messages;
    }

    pub fn position_index(&self, position_id: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.id == position_id)
    }

    pub fn status_at(&self, index: usize) -> Option<PositionStatus> {
        self.positions.get(index).map(|p| p.status)
    }

    /// Number of cells that are not `None` (stones and pending markers).
    pub fn occupied_count(&self) -> usize {
        self.positions.iter().filter(|p| !p.status.is_empty()).count()
    }

    /// Whether the board and the move list agree.
    pub fn is_consistent(&self) -> bool {
        let mut seen = vec![false; self.positions.len()];
        for &idx in &self.selected_positions {
            match seen.get_mut(idx) {
                Some(flag) if !*flag => *flag = true,
                _ => return false,
            }
        }
        self.positions
            .iter()
            .zip(&seen)
            .all(|(p, &selected)| p.status.is_empty() != selected)
    }

    /// Indices of cells currently marked pending.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == PositionStatus::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    /// Colour of the most recently placed stone, skipping pending markers.
    pub fn last_stone(&self) -> Option<Color> {
        self.selected_positions
            .iter()
            .rev()
            .find_map(|&idx| self.status_at(idx).and_then(PositionStatus::stone))
    }

    pub fn has_moves(&self) -> bool {
        self.last_stone().is_some()
    }

    /// Place `status` on `index` and record the move.
    ///
    /// Returns `false` if the index is out of range or already taken.
    pub fn place(&mut self, index: usize, status: PositionStatus) -> bool {
        match self.positions.get_mut(index) {
            Some(p) if p.status.is_empty() => {
                p.status = status;
                self.selected_positions.push(index);
                true
            }
            _ => false,
        }
    }

    /// Undo a placement, clearing the cell and dropping its index.
    pub fn unplace(&mut self, index: usize) {
        if let Some(p) = self.positions.get_mut(index) {
            p.status = PositionStatus::None;
        }
        self.selected_positions.retain(|&i| i != index);
    }

    /// Clear every cell and the move list.
    pub fn clear_board(&mut self) {
        for p in &mut self.positions {
            p.status = PositionStatus::None;
        }
        self.selected_positions.clear();
    }

    pub fn replace_players(&mut self, players: Vec<PlayerDetail>) {
        self.players = players.into_iter().map(Into::into).collect();
    }

    pub fn slot(&self, user_id: &str) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    /// The first registered player that is not `user_id`.
    pub fn opponent_of(&self, user_id: &str) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.user_id != user_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// Human-readable status line.
    pub fn status_label(&self) -> String {
        match self.status {
            GameStatus::Active => format!("Current Player: {}", self.current_player),
            GameStatus::Won => format!("{} won!", self.current_player),
            GameStatus::Drawn => "DRAW".to_string(),
        }
    }

    /// 1-based move number of the stone at `index`, if any.
    pub fn move_number(&self, index: usize) -> Option<usize> {
        self.selected_positions
            .iter()
            .position(|&i| i == index)
            .map(|n| n + 1)
    }
}

/// Snapshot builders shared by this workspace's tests.
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures {
    use super::*;

    /// An empty `rows` x `cols` snapshot with ids `p0`, `p1`, ...
    pub fn empty_snapshot(rows: usize, cols: usize, is_multi: bool) -> GameSnapshot {
        GameSnapshot {
            id: "g1".into(),
            game_number: 1,
            size: [rows, cols],
            status: GameStatus::Active,
            positions: (0..rows * cols)
                .map(|i| PositionInfo {
                    id: format!("p{i}"),
                    status: PositionStatus::None,
                })
                .collect(),
            selected_positions: Vec::new(),
            is_multi,
            players: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn player(id: &str, name: &str, color: Color) -> PlayerDetail {
        PlayerDetail {
            user_id: id.into(),
            user_name: name.into(),
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn fresh_session_is_consistent() {
        let s = GameSession::from_snapshot(empty_snapshot(9, 9, false));
        assert_eq!(s.positions.len(), 81);
        assert!(s.is_consistent());
        assert_eq!(s.current_player, Color::Black);
        assert_eq!(s.status_label(), "Current Player: BLACK");
    }

    #[test]
    fn place_and_unplace_keep_invariant() {
        let mut s = GameSession::from_snapshot(empty_snapshot(3, 3, false));
        assert!(s.place(4, PositionStatus::Black));
        assert!(!s.place(4, PositionStatus::White));
        assert!(s.place(0, PositionStatus::Pending));
        assert_eq!(s.occupied_count(), s.selected_positions.len());
        assert!(s.is_consistent());
        assert_eq!(s.pending_indices(), vec![0]);
        assert_eq!(s.last_stone(), Some(Color::Black));

        s.unplace(0);
        assert_eq!(s.selected_positions, vec![4]);
        assert!(s.is_consistent());
    }

    #[test]
    fn inconsistency_is_detected() {
        let mut s = GameSession::from_snapshot(empty_snapshot(2, 2, false));
        s.positions[1].status = PositionStatus::White;
        assert!(!s.is_consistent());
        s.selected_positions.push(1);
        assert!(s.is_consistent());
        s.selected_positions.push(1);
        assert!(!s.is_consistent());
    }

    #[test]
    fn adopt_board_keeps_chat() {
        let mut s = GameSession::from_snapshot(empty_snapshot(2, 2, false));
        s.messages.push(ChatMessage {
            user_id: "u1".into(),
            user_name: "ann".into(),
            message: "hello".into(),
        });
        s.place(0, PositionStatus::Black);
        s.adopt_board(empty_snapshot(2, 2, false));
        assert_eq!(s.selected_positions.len(), 0);
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn move_numbers_are_one_based() {
        let mut s = GameSession::from_snapshot(empty_snapshot(2, 2, false));
        s.place(3, PositionStatus::Black);
        s.place(1, PositionStatus::White);
        assert_eq!(s.move_number(3), Some(1));
        assert_eq!(s.move_number(1), Some(2));
        assert_eq!(s.move_number(0), None);
    }

    #[test]
    fn won_label_names_the_mover() {
        let mut snap = empty_snapshot(2, 2, true);
        snap.players = vec![player("u1", "ann", Color::Black)];
        snap.positions[2].status = PositionStatus::Black;
        snap.selected_positions = vec![2];
        snap.status = GameStatus::Won;
        let s = GameSession::from_snapshot(snap);
        assert_eq!(s.status_label(), "BLACK won!");
    }
}
