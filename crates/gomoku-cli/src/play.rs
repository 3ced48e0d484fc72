//! Interactive game loop: keyboard commands in, session events out.

use gomoku_client::api::HttpGameApi;
use gomoku_client::config::{ClientConfig, Identity};
use gomoku_client::connection::ConnectionManager;
use gomoku_client::presence::{FileStore, PresenceBridge, TeardownReason};
use gomoku_client::{GameController, PollResult, load_session};
use gomoku_core::protocol::GameSnapshot;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::render;

type Controller = GameController<HttpGameApi, FileStore>;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// 1-based row and column.
    Move(usize, usize),
    Chat(String),
    Reset,
    /// Step away; the opponent is told you are resting.
    Pause,
    Leave,
    Logout,
    Reload,
    Help,
    Unknown(String),
    Empty,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match word.to_ascii_lowercase().as_str() {
            "" => Input::Empty,
            "m" | "move" => {
                let mut nums = rest.split_whitespace().map(str::parse::<usize>);
                match (nums.next(), nums.next(), nums.next()) {
                    (Some(Ok(row)), Some(Ok(col)), None) if row > 0 && col > 0 => {
                        Input::Move(row, col)
                    }
                    _ => Input::Unknown(line.to_string()),
                }
            }
            "say" | "c" => Input::Chat(rest.to_string()),
            "reset" | "restart" => Input::Reset,
            "pause" | "quit" | "q" => Input::Pause,
            "leave" => Input::Leave,
            "logout" => Input::Logout,
            "reload" => Input::Reload,
            "help" | "?" => Input::Help,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

/// Board index of the 1-based `row` and `col`, if they lie on the board.
pub fn cell_index(row: usize, col: usize, rows: usize, cols: usize) -> Option<usize> {
    if !(1..=rows).contains(&row) || !(1..=cols).contains(&col) {
        return None;
    }
    (row - 1).checked_mul(cols)?.checked_add(col - 1)
}

enum Exit {
    Pause,
    Leave,
    Logout,
    Reload,
    Expired,
}

/// Enter `game_id` and play until the player steps away.
///
/// Lost liveness rebuilds the session from a fresh fetch and carries on.
pub async fn run(
    config: &ClientConfig,
    api: HttpGameApi,
    identity: Identity,
    store: FileStore,
    game_id: &str,
    mut handoff: Option<GameSnapshot>,
    mut join: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bridge = PresenceBridge::new(store);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let session = match load_session(&api, &mut bridge, game_id, handoff.take()).await {
            Ok(session) => session,
            Err(e) if e.is_auth() => {
                bridge.forget_user();
                println!("Session expired ({e}). Please log in again.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let connection = ConnectionManager::connect(config, game_id, &identity.user_id).await?;
        let mut ctrl = GameController::new(api.clone(), identity.clone(), session, connection, bridge);

        if std::mem::take(&mut join)
            && let Err(e) = ctrl.join().await
        {
            println!("Could not join: {e}");
        }

        let exit = if ctrl.is_expired() {
            Exit::Expired
        } else {
            event_loop(&mut ctrl, &mut lines).await?
        };
        bridge = match exit {
            Exit::Reload => {
                println!("Connection lost, reloading...");
                ctrl.teardown(TeardownReason::Reload, None).await
            }
            Exit::Pause => {
                ctrl.teardown(TeardownReason::Navigate, Some("/")).await;
                return Ok(());
            }
            Exit::Leave => {
                ctrl.leave().await;
                println!("You left the game.");
                return Ok(());
            }
            Exit::Logout => {
                ctrl.logout().await;
                println!("Logged out.");
                return Ok(());
            }
            Exit::Expired => {
                let mut bridge = ctrl.teardown(TeardownReason::SessionExpired, Some("/")).await;
                bridge.forget_user();
                println!("Session expired. Please log in again.");
                return Ok(());
            }
        };
    }
}

async fn event_loop(
    ctrl: &mut Controller,
    lines: &mut Lines<BufReader<Stdin>>,
) -> std::io::Result<Exit> {
    render::draw(ctrl);
    render::help();

    loop {
        tokio::select! {
            poll = ctrl.recv() => {
                match poll {
                    PollResult::Updated(changed) => {
                        let events = ctrl.drain_events();
                        render::print_events(&events);
                        if changed.board || changed.turn || changed.status || changed.error {
                            render::draw(ctrl);
                        }
                    }
                    PollResult::Disconnected => {
                        render::print_events(&ctrl.drain_events());
                        println!("Live updates stopped. Type `reload` to reconnect.");
                    }
                    PollResult::ReloadRequired => return Ok(Exit::Reload),
                    PollResult::SessionExpired => return Ok(Exit::Expired),
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(Exit::Pause);
                };
                match Input::parse(&line) {
                    Input::Move(row, col) => {
                        let (rows, cols) = (ctrl.session().rows, ctrl.session().cols);
                        let Some(index) = cell_index(row, col, rows, cols) else {
                            println!("Pick a row between 1 and {rows} and a column between 1 and {cols}.");
                            continue;
                        };
                        match ctrl.submit_move(index) {
                            Ok(_) => render::draw(ctrl),
                            Err(e) => println!("{e}"),
                        }
                    }
                    Input::Chat(text) => {
                        if let Err(e) = ctrl.send_chat(&text) {
                            println!("{e}");
                        }
                    }
                    Input::Reset => match ctrl.reset_game() {
                        Ok(_) => render::draw(ctrl),
                        Err(e) => println!("{e}"),
                    },
                    Input::Pause => return Ok(Exit::Pause),
                    Input::Leave => return Ok(Exit::Leave),
                    Input::Logout => return Ok(Exit::Logout),
                    Input::Reload => return Ok(Exit::Reload),
                    Input::Help => render::help(),
                    Input::Unknown(text) => println!("Unknown command `{text}`. Type `help`."),
                    Input::Empty => render::draw(ctrl),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moves_and_chat() {
        assert_eq!(Input::parse("m 3 4"), Input::Move(3, 4));
        assert_eq!(Input::parse("  MOVE 10 1 "), Input::Move(10, 1));
        assert_eq!(Input::parse("say good game!"), Input::Chat("good game!".into()));
        assert_eq!(Input::parse("reset"), Input::Reset);
        assert_eq!(Input::parse(""), Input::Empty);
    }

    #[test]
    fn cell_index_stays_on_the_board() {
        assert_eq!(cell_index(1, 1, 15, 15), Some(0));
        assert_eq!(cell_index(2, 3, 15, 15), Some(17));
        assert_eq!(cell_index(15, 15, 15, 15), Some(224));
        assert_eq!(cell_index(16, 1, 15, 15), None);
        assert_eq!(cell_index(1, 16, 15, 15), None);
        assert_eq!(cell_index(0, 1, 15, 15), None);
    }

    #[test]
    fn huge_row_is_refused_not_wrapped() {
        let Input::Move(row, col) = Input::parse("m 1229782938247303443 1") else {
            panic!("expected a move");
        };
        assert_eq!(cell_index(row, col, 15, 15), None);
        assert_eq!(cell_index(usize::MAX, usize::MAX, usize::MAX, usize::MAX), None);
    }

    #[test]
    fn rejects_malformed_moves() {
        assert!(matches!(Input::parse("m 0 4"), Input::Unknown(_)));
        assert!(matches!(Input::parse("m 3"), Input::Unknown(_)));
        assert!(matches!(Input::parse("m a b"), Input::Unknown(_)));
        assert!(matches!(Input::parse("m 1 2 3"), Input::Unknown(_)));
    }
}
