//! Optimistic move and reset bookkeeping.
//!
//! The coordinator never talks to the network. It mutates the session before
//! a request goes out and settles it when the outcome is known, so at most
//! one board-changing request is in flight at a time.
//!
//! A failed move leaves a pending marker on its cell. The marker is rolled
//! back by the next attempt, whichever cell that attempt targets, so the board
//! never shows more than one unconfirmed cell.

use gomoku_core::protocol::{Color, GameSnapshot, GameStatus, MoveReply, PositionStatus};
use gomoku_core::session::{BoardPosition, GameSession};
use thiserror::Error;
use tracing::{debug, info};

/// Banner shown after a move could not be confirmed.
pub const RETRY_MESSAGE: &str = "Something went wrong. Your selected position is not confirmed \
yet. It is marked in yellow for now. You can try selecting it again or you can choose a \
different position if you wish.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveRejected {
    #[error("another update is still in flight")]
    Busy,
    #[error("the game is over")]
    GameOver,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("you do not have a seat in this game")]
    NotSeated,
    #[error("position {0} is not on the board")]
    OutOfRange(usize),
    #[error("position {0} is already taken")]
    Occupied(usize),
    #[error("the board can only be restarted while you play alone")]
    OpponentPresent,
    #[error("the session has expired")]
    SessionExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    Idle,
    Pending,
    /// The last move was confirmed.
    Confirmed,
    /// The last move failed; its cell is marked pending.
    Failed,
}

/// A move that has been applied locally and sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAttempt {
    pub position_id: String,
    pub index: usize,
    pub color: Color,
    turn_before: Color,
}

/// Board state captured before an optimistic reset.
#[derive(Debug, Clone)]
struct BoardSnapshot {
    positions: Vec<BoardPosition>,
    selected_positions: Vec<usize>,
    status: GameStatus,
    current_player: Color,
    stale_marker: Option<usize>,
}

impl BoardSnapshot {
    fn capture(session: &GameSession, stale_marker: Option<usize>) -> Self {
        Self {
            positions: session.positions.clone(),
            selected_positions: session.selected_positions.clone(),
            status: session.status,
            current_player: session.current_player,
            stale_marker,
        }
    }

    fn restore(self, session: &mut GameSession) -> Option<usize> {
        session.positions = self.positions;
        session.selected_positions = self.selected_positions;
        session.status = self.status;
        session.current_player = self.current_player;
        self.stale_marker
    }
}

#[derive(Debug, Clone)]
enum InFlight {
    Move(MoveAttempt),
    Reset(BoardSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Confirmed,
    Failed,
}

#[derive(Debug, Default)]
pub struct MoveCoordinator {
    in_flight: Option<InFlight>,
    /// Cell left pending by the last failed move.
    stale_marker: Option<usize>,
    last_outcome: Option<Outcome>,
}

impl MoveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MovePhase {
        match (&self.in_flight, self.last_outcome) {
            (Some(_), _) => MovePhase::Pending,
            (None, Some(Outcome::Confirmed)) => MovePhase::Confirmed,
            (None, Some(Outcome::Failed)) => MovePhase::Failed,
            (None, None) => MovePhase::Idle,
        }
    }

    /// Whether a move or reset is waiting for the server.
    pub fn is_updating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn stale_marker(&self) -> Option<usize> {
        self.stale_marker
    }

    /// Validate a move by `local_user` on `index` and apply it optimistically.
    ///
    /// Any marker left by an earlier failure is rolled back first.
    pub fn begin_move(
        &mut self,
        session: &mut GameSession,
        index: usize,
        local_user: &str,
    ) -> Result<MoveAttempt, MoveRejected> {
        if self.in_flight.is_some() {
            return Err(MoveRejected::Busy);
        }
        if !session.is_active() {
            return Err(MoveRejected::GameOver);
        }
        let color = if session.is_multi {
            let slot = session.slot(local_user).ok_or(MoveRejected::NotSeated)?;
            if slot.color != session.current_player {
                return Err(MoveRejected::NotYourTurn);
            }
            slot.color
        } else {
            session.current_player
        };

        let target = session
            .status_at(index)
            .ok_or(MoveRejected::OutOfRange(index))?;
        let retrying_marker =
            target == PositionStatus::Pending && self.stale_marker == Some(index);
        if !target.is_empty() && !retrying_marker {
            return Err(MoveRejected::Occupied(index));
        }

        if let Some(stale) = self.stale_marker.take()
            && session.status_at(stale) == Some(PositionStatus::Pending)
        {
            debug!(index = stale, "rolling back unconfirmed marker");
            session.unplace(stale);
        }

        let attempt = MoveAttempt {
            position_id: session.positions[index].id.clone(),
            index,
            color,
            turn_before: session.current_player,
        };
        session.place(index, color.into());
        self.in_flight = Some(InFlight::Move(attempt.clone()));
        self.last_outcome = None;
        Ok(attempt)
    }

    /// The server accepted the move: adopt its status and next player.
    ///
    /// Returns `None` if no move was in flight.
    pub fn confirm_move(
        &mut self,
        session: &mut GameSession,
        reply: MoveReply,
    ) -> Option<MoveAttempt> {
        let attempt = self.take_move()?;
        session.status = reply.status;
        session.current_player = reply.player;
        self.last_outcome = Some(Outcome::Confirmed);
        info!(index = attempt.index, status = ?reply.status, "move confirmed");
        Some(attempt)
    }

    /// The server did not accept the move: mark its cell pending and restore
    /// the turn. The cell stays in the move list until the next attempt.
    pub fn fail_move(&mut self, session: &mut GameSession) -> Option<MoveAttempt> {
        let attempt = self.take_move()?;
        let ours = PositionStatus::from(attempt.color);
        if let Some(cell) = session.positions.get_mut(attempt.index)
            && cell.status == ours
        {
            cell.status = PositionStatus::Pending;
            self.stale_marker = Some(attempt.index);
        }
        session.current_player = attempt.turn_before;
        self.last_outcome = Some(Outcome::Failed);
        Some(attempt)
    }

    /// Clear the board optimistically. Only allowed while playing alone.
    pub fn begin_reset(&mut self, session: &mut GameSession) -> Result<(), MoveRejected> {
        if self.in_flight.is_some() {
            return Err(MoveRejected::Busy);
        }
        if !session.is_active() {
            return Err(MoveRejected::GameOver);
        }
        if session.players.len() > 1 {
            return Err(MoveRejected::OpponentPresent);
        }

        let snapshot = BoardSnapshot::capture(session, self.stale_marker.take());
        session.clear_board();
        session.current_player = gomoku_core::turn::whose_turn(session);
        self.in_flight = Some(InFlight::Reset(snapshot));
        self.last_outcome = None;
        Ok(())
    }

    /// Adopt the server's fresh board after a reset.
    pub fn confirm_reset(&mut self, session: &mut GameSession, fresh: GameSnapshot) -> bool {
        if self.take_reset().is_none() {
            return false;
        }
        session.adopt_board(fresh);
        self.last_outcome = Some(Outcome::Confirmed);
        true
    }

    /// Put the board back exactly as it was before the reset.
    pub fn fail_reset(&mut self, session: &mut GameSession) -> bool {
        let Some(snapshot) = self.take_reset() else {
            return false;
        };
        self.stale_marker = snapshot.restore(session);
        self.last_outcome = Some(Outcome::Failed);
        true
    }

    fn take_move(&mut self) -> Option<MoveAttempt> {
        match self.in_flight.take() {
            Some(InFlight::Move(attempt)) => Some(attempt),
            other => {
                self.in_flight = other;
                None
            }
        }
    }

    fn take_reset(&mut self) -> Option<BoardSnapshot> {
        match self.in_flight.take() {
            Some(InFlight::Reset(snapshot)) => Some(snapshot),
            other => {
                self.in_flight = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn solo() -> GameSession {
        GameSession::from_snapshot(empty_snapshot(15, 15, false))
    }

    fn reply(status: GameStatus, player: Color) -> MoveReply {
        MoveReply { status, player }
    }

    #[test]
    fn confirmed_move_adopts_server_turn() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();

        let attempt = moves.begin_move(&mut s, 112, "me").unwrap();
        assert_eq!(attempt.color, Color::Black);
        assert_eq!(attempt.position_id, "p112");
        assert_eq!(moves.phase(), MovePhase::Pending);
        assert_eq!(s.status_at(112), Some(PositionStatus::Black));

        moves.confirm_move(&mut s, reply(GameStatus::Active, Color::White));
        assert_eq!(moves.phase(), MovePhase::Confirmed);
        assert_eq!(s.current_player, Color::White);
        assert_eq!(s.selected_positions, vec![112]);
        assert_eq!(s.status_label(), "Current Player: WHITE");
    }

    #[test]
    fn failed_move_leaves_marker_then_next_attempt_clears_it() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();

        moves.begin_move(&mut s, 112, "me").unwrap();
        moves.confirm_move(&mut s, reply(GameStatus::Active, Color::White));

        moves.begin_move(&mut s, 113, "me").unwrap();
        moves.fail_move(&mut s);
        assert_eq!(moves.phase(), MovePhase::Failed);
        assert_eq!(s.status_at(113), Some(PositionStatus::Pending));
        assert_eq!(s.selected_positions, vec![112, 113]);
        assert_eq!(s.current_player, Color::White);
        assert!(s.is_consistent());

        let attempt = moves.begin_move(&mut s, 114, "me").unwrap();
        assert_eq!(attempt.color, Color::White);
        assert_eq!(s.status_at(113), Some(PositionStatus::None));
        assert_eq!(s.status_at(114), Some(PositionStatus::White));
        assert_eq!(s.selected_positions, vec![112, 114]);
        assert!(s.is_consistent());
    }

    #[test]
    fn retrying_the_marked_cell_is_allowed() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();

        moves.begin_move(&mut s, 7, "me").unwrap();
        moves.fail_move(&mut s);
        let attempt = moves.begin_move(&mut s, 7, "me").unwrap();
        assert_eq!(attempt.index, 7);
        assert_eq!(s.status_at(7), Some(PositionStatus::Black));
        assert_eq!(s.selected_positions, vec![7]);
    }

    #[test]
    fn at_most_one_pending_marker_over_many_failures() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();
        for idx in [3, 9, 9, 40, 41, 3] {
            moves.begin_move(&mut s, idx, "me").unwrap();
            moves.fail_move(&mut s);
            assert!(s.pending_indices().len() <= 1);
            assert!(s.is_consistent());
        }
        assert_eq!(s.pending_indices(), vec![3]);
    }

    #[test]
    fn one_request_at_a_time() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();
        moves.begin_move(&mut s, 0, "me").unwrap();
        assert_eq!(moves.begin_move(&mut s, 1, "me"), Err(MoveRejected::Busy));
        assert_eq!(moves.begin_reset(&mut s), Err(MoveRejected::Busy));
    }

    #[test]
    fn gating_rules() {
        let mut s = GameSession::from_snapshot(duel(3, 3));
        let mut moves = MoveCoordinator::new();

        assert_eq!(
            moves.begin_move(&mut s, 0, "them"),
            Err(MoveRejected::NotYourTurn)
        );
        assert_eq!(
            moves.begin_move(&mut s, 0, "ghost"),
            Err(MoveRejected::NotSeated)
        );
        assert_eq!(
            moves.begin_move(&mut s, 99, "me"),
            Err(MoveRejected::OutOfRange(99))
        );

        s.place(4, PositionStatus::White);
        assert_eq!(
            moves.begin_move(&mut s, 4, "me"),
            Err(MoveRejected::Occupied(4))
        );

        s.status = GameStatus::Won;
        assert_eq!(moves.begin_move(&mut s, 0, "me"), Err(MoveRejected::GameOver));
        assert_eq!(moves.phase(), MovePhase::Idle);
    }

    #[test]
    fn reset_then_failure_restores_board_exactly() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();
        moves.begin_move(&mut s, 0, "me").unwrap();
        moves.confirm_move(&mut s, reply(GameStatus::Active, Color::White));
        moves.begin_move(&mut s, 1, "me").unwrap();
        moves.fail_move(&mut s);
        let before = s.clone();

        moves.begin_reset(&mut s).unwrap();
        assert!(s.selected_positions.is_empty());
        assert_eq!(s.occupied_count(), 0);

        assert!(moves.fail_reset(&mut s));
        assert_eq!(s, before);
        assert_eq!(moves.stale_marker(), Some(1));
    }

    #[test]
    fn reset_adopts_fresh_board() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();
        moves.begin_move(&mut s, 0, "me").unwrap();
        moves.confirm_move(&mut s, reply(GameStatus::Active, Color::White));

        moves.begin_reset(&mut s).unwrap();
        assert!(moves.confirm_reset(&mut s, empty_snapshot(15, 15, false)));
        assert!(s.selected_positions.is_empty());
        assert_eq!(s.current_player, Color::Black);
        assert_eq!(moves.phase(), MovePhase::Confirmed);
    }

    #[test]
    fn reset_needs_the_board_to_yourself() {
        let mut s = GameSession::from_snapshot(duel(3, 3));
        let mut moves = MoveCoordinator::new();
        assert_eq!(
            moves.begin_reset(&mut s),
            Err(MoveRejected::OpponentPresent)
        );
    }

    #[test]
    fn stray_outcomes_are_ignored() {
        let mut s = solo();
        let mut moves = MoveCoordinator::new();
        assert!(moves.confirm_move(&mut s, reply(GameStatus::Won, Color::Black)).is_none());
        assert!(moves.fail_move(&mut s).is_none());
        assert!(!moves.fail_reset(&mut s));
        assert_eq!(s.status, GameStatus::Active);
    }
}
