//! Whose turn is it, derived purely from session history.
//!
//! The server has the final say on legality; this derivation only gates UI
//! interaction and fills in the turn until the server names one.

use crate::protocol::{Color, GameStatus};
use crate::session::{GameSession, PlayerSlot};

/// Colour that opens a game with no moves.
pub fn opening_color(is_multi: bool, players: &[PlayerSlot]) -> Color {
    if is_multi {
        players.first().map_or(Color::Black, |p| p.color)
    } else {
        Color::Black
    }
}

/// Colour to move next.
///
/// Once the server reports the game over, the label freezes on the colour
/// that made the last move.
pub fn whose_turn(session: &GameSession) -> Color {
    match session.last_stone() {
        None => opening_color(session.is_multi, &session.players),
        Some(last) if session.status == GameStatus::Active => last.opposite(),
        Some(last) => last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PositionStatus;
    use crate::session::fixtures::*;

    #[test]
    fn single_player_opens_with_black_and_alternates() {
        let mut s = GameSession::from_snapshot(empty_snapshot(9, 9, false));
        assert_eq!(whose_turn(&s), Color::Black);

        let mut expected = Color::Black;
        for idx in 0..10 {
            let mover = whose_turn(&s);
            assert_eq!(mover, expected);
            s.place(idx, mover.into());
            expected = expected.opposite();
            assert_eq!(whose_turn(&s), expected);
        }
    }

    #[test]
    fn multiplayer_opens_with_first_registered_color() {
        let mut snap = empty_snapshot(9, 9, true);
        snap.players = vec![
            player("u1", "ann", Color::White),
            player("u2", "bo", Color::Black),
        ];
        let s = GameSession::from_snapshot(snap);
        assert_eq!(whose_turn(&s), Color::White);
    }

    #[test]
    fn multiplayer_next_is_opposite_of_mover() {
        let mut snap = empty_snapshot(9, 9, true);
        snap.players = vec![
            player("u1", "ann", Color::White),
            player("u2", "bo", Color::Black),
        ];
        let mut s = GameSession::from_snapshot(snap);
        s.place(5, PositionStatus::White);
        assert_eq!(whose_turn(&s), Color::Black);
    }

    #[test]
    fn finished_game_freezes_on_mover() {
        let mut s = GameSession::from_snapshot(empty_snapshot(9, 9, false));
        s.place(0, PositionStatus::Black);
        s.place(1, PositionStatus::White);
        s.status = GameStatus::Won;
        assert_eq!(whose_turn(&s), Color::White);
        s.status = GameStatus::Drawn;
        assert_eq!(whose_turn(&s), Color::White);
    }

    #[test]
    fn pending_markers_do_not_count_as_moves() {
        let mut s = GameSession::from_snapshot(empty_snapshot(9, 9, false));
        s.place(0, PositionStatus::Black);
        s.place(1, PositionStatus::Pending);
        assert_eq!(whose_turn(&s), Color::White);
    }
}
