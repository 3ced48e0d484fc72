//! Realtime session engine for a networked gomoku client.
//!
//! Keeps a [`GameSession`](gomoku_core::session::GameSession) in sync with the
//! server over REST and a per-game WebSocket, applying the player's own moves
//! and chat optimistically and rolling them back when the server disagrees.

pub mod api;
pub mod archive;
pub mod chat;
pub mod config;
pub mod connection;
pub mod controller;
pub mod events;
pub mod moves;
pub mod presence;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ControllerError, GameController, PollResult, load_session};
