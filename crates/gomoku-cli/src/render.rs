//! Plain-text rendering of the board and notifications.

use std::fmt::Write as _;

use gomoku_client::api::HttpGameApi;
use gomoku_client::archive;
use gomoku_client::events::SessionEvent;
use gomoku_client::presence::FileStore;
use gomoku_client::GameController;
use gomoku_core::protocol::PositionStatus;
use gomoku_core::session::GameSession;

fn cell(status: PositionStatus) -> char {
    match status {
        PositionStatus::None => '.',
        PositionStatus::Black => 'X',
        PositionStatus::White => 'O',
        PositionStatus::Pending => '?',
    }
}

/// The board as text, with 1-based row and column numbers.
pub fn board(session: &GameSession) -> String {
    let mut out = String::from("    ");
    for col in 1..=session.cols {
        let _ = write!(out, "{:>3}", col);
    }
    out.push('\n');
    for (row, cells) in session.positions.chunks(session.cols.max(1)).enumerate() {
        let _ = write!(out, "{:>3} ", row + 1);
        for p in cells {
            let _ = write!(out, "{:>3}", cell(p.status));
        }
        out.push('\n');
    }
    out
}

/// The board with each stone replaced by its move number.
pub fn replay(session: &GameSession) -> String {
    let mut out = String::new();
    for (row, cells) in session.positions.chunks(session.cols.max(1)).enumerate() {
        let _ = write!(out, "{:>3} ", row + 1);
        for (col, p) in cells.iter().enumerate() {
            let index = row * session.cols + col;
            match session.move_number(index) {
                Some(n) if p.status.stone().is_some() => {
                    let _ = write!(out, "{:>3}{}", n, cell(p.status));
                }
                _ => {
                    let _ = write!(out, "{:>4}", cell(p.status));
                }
            }
        }
        out.push('\n');
    }
    out
}

pub fn draw(ctrl: &GameController<HttpGameApi, FileStore>) {
    let session = ctrl.session();
    println!();
    print!("{}", board(session));
    println!("{}", session.status_label());

    let seats: Vec<String> = session
        .players
        .iter()
        .map(|p| format!("{} ({})", p.user_name, p.color))
        .collect();
    if !seats.is_empty() {
        println!("Players: {}", seats.join(", "));
    }
    if session.is_active() && session.is_multi && !ctrl.is_my_turn() {
        println!("Waiting for your opponent...");
    }
    if let Some(error) = ctrl.error_message() {
        println!("! {error}");
    }
}

pub fn print_events(events: &[SessionEvent]) {
    for event in events {
        println!("* {}", event.describe());
    }
}

pub fn print_replay(session: &GameSession) {
    print!("{}", replay(session));
    let last = session.last_stone().map(PositionStatus::from);
    println!("{}", archive::outcome_label(session.status, last));
}

pub fn help() {
    println!(
        "Commands: m <row> <col> | say <text> | reset | pause | leave | logout | reload | help"
    );
}
