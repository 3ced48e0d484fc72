//! Read-only access to finished games.

use gomoku_core::protocol::{CompletedGame, GameStatus, GameSummary, PositionStatus};
use gomoku_core::session::GameSession;

use crate::api::GameApi;
use crate::controller::ControllerError;

/// Load a finished game for replay.
///
/// The game must still be listed among completed games.
pub async fn load_game_log<A: GameApi>(
    api: &A,
    game_id: &str,
) -> Result<GameSession, ControllerError> {
    let completed = api.list_completed().await?;
    if !completed.iter().any(|g| g.id == game_id) {
        return Err(ControllerError::GameNotFound(game_id.to_string()));
    }
    let snapshot = api.fetch_game_log(game_id).await?;
    Ok(GameSession::from_snapshot(snapshot))
}

/// Outcome line for a finished game, named after the colour of its last stone.
pub fn outcome_label(status: GameStatus, last: Option<PositionStatus>) -> String {
    match (status, last.and_then(PositionStatus::stone)) {
        (GameStatus::Drawn, _) => "Game is a draw".to_string(),
        (GameStatus::Won, Some(color)) => format!("Winner: {color}"),
        (GameStatus::Won, None) => "Winner unknown".to_string(),
        (GameStatus::Active, _) => "In progress".to_string(),
    }
}

fn date_part(timestamp: Option<&str>) -> &str {
    timestamp
        .and_then(|t| t.split('T').next())
        .unwrap_or("")
}

/// One line of the history listing.
pub fn completed_line(game: &CompletedGame) -> String {
    let last = game.last_selected_position.map(|p| p.status);
    format!(
        "Game-{}  {}  {}  [{}]",
        game.game_number,
        date_part(game.created_at.as_deref()),
        outcome_label(game.status, last),
        game.id
    )
}

/// One line of the in-progress listing.
pub fn active_line(game: &GameSummary) -> String {
    let [rows, cols] = game.size;
    let mode = if game.is_multi { "multi" } else { "solo" };
    format!(
        "Game-{}  {rows}x{cols}  {mode}  {}/2 seated  {}  [{}]",
        game.game_number,
        game.players.len(),
        date_part(game.created_at.as_deref()),
        game.id
    )
}

#[cfg(test)]
mod tests {
    use gomoku_core::protocol::LastPosition;

    use super::*;
    use crate::api::fake::FakeApi;
    use crate::testing::*;

    fn finished(id: &str, status: GameStatus, last: PositionStatus) -> CompletedGame {
        CompletedGame {
            id: id.into(),
            game_number: 4,
            status,
            created_at: Some("2024-03-01T10:00:00.000Z".into()),
            updated_at: None,
            last_selected_position: Some(LastPosition { status: last }),
        }
    }

    #[test]
    fn listing_names_the_winner() {
        let line = completed_line(&finished("g4", GameStatus::Won, PositionStatus::White));
        assert_eq!(line, "Game-4  2024-03-01  Winner: WHITE  [g4]");
        let draw = completed_line(&finished("g5", GameStatus::Drawn, PositionStatus::Black));
        assert!(draw.contains("Game is a draw"));
    }

    #[tokio::test]
    async fn only_completed_games_can_be_replayed() {
        let mut snap = empty_snapshot(3, 3, false);
        snap.id = "g4".into();
        snap.status = GameStatus::Won;
        let api = FakeApi::with_game(snap);

        let err = load_game_log(&api, "g4").await.unwrap_err();
        assert!(matches!(err, ControllerError::GameNotFound(_)));

        api.script
            .lock()
            .unwrap()
            .completed
            .push(finished("g4", GameStatus::Won, PositionStatus::Black));
        let session = load_game_log(&api, "g4").await.unwrap();
        assert_eq!(session.status, GameStatus::Won);
    }
}
