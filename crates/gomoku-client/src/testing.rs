//! Shared fixtures for the engine's unit tests.

use gomoku_core::protocol::{Color, GameSnapshot};
pub use gomoku_core::session::fixtures::{empty_snapshot, player};

/// Two-seat multiplayer game: `me` plays BLACK and opens, `them` plays WHITE.
pub fn duel(rows: usize, cols: usize) -> GameSnapshot {
    let mut snap = empty_snapshot(rows, cols, true);
    snap.players = vec![
        player("me", "ann", Color::Black),
        player("them", "bo", Color::White),
    ];
    snap
}
