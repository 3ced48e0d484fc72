//! REST access to the game server.
//!
//! [`GameApi`] is the seam the engine talks through. [`HttpGameApi`] is the
//! production implementation; tests script their own.

use std::future::Future;

use gomoku_core::protocol::{
    CompletedGame, CreateGame, ErrorBody, GameSnapshot, GameSummary, MoveReply, PresenceAction,
};
use thiserror::Error;

/// Server messages that mean the caller's credentials are no longer valid.
pub const AUTH_ERRORS: &[&str] = &["Invalid token", "Token missing", "Invalid user"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The token was rejected. The session must be abandoned.
    #[error("{0}")]
    Auth(String),

    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success response from its status and raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = serde_json::from_str::<ErrorBody>(trimmed)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                if trimmed.is_empty() {
                    format!("request failed with status {status}")
                } else {
                    trimmed.to_string()
                }
            });

        if AUTH_ERRORS.contains(&message.as_str()) {
            ApiError::Auth(message)
        } else {
            ApiError::Server { status, message }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

/// Everything the engine asks of the REST server.
///
/// Implementations are cheap to clone; the engine hands a clone to each
/// background request.
pub trait GameApi: Clone + Send + Sync + 'static {
    /// `GET /api`: games still in progress.
    fn list_active(&self) -> impl Future<Output = Result<Vec<GameSummary>, ApiError>> + Send;

    /// `GET /api/games`: finished games.
    fn list_completed(&self)
    -> impl Future<Output = Result<Vec<CompletedGame>, ApiError>> + Send;

    fn fetch_game(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<GameSnapshot, ApiError>> + Send;

    fn fetch_game_log(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<GameSnapshot, ApiError>> + Send;

    fn create_game(
        &self,
        request: CreateGame,
    ) -> impl Future<Output = Result<GameSnapshot, ApiError>> + Send;

    fn submit_move(
        &self,
        game_id: &str,
        position_id: &str,
    ) -> impl Future<Output = Result<MoveReply, ApiError>> + Send;

    /// Persist a chat line. Relaying it to the opponent is the caller's job.
    fn send_chat(
        &self,
        game_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn presence(
        &self,
        game_id: &str,
        action: PresenceAction,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Clear the board. Returns the fresh snapshot.
    fn reset(&self, game_id: &str)
    -> impl Future<Output = Result<GameSnapshot, ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[cfg(feature = "native")]
pub use http::HttpGameApi;

#[cfg(feature = "native")]
mod http {
    use gomoku_core::protocol::{
        CompletedGame, CreateGame, GameSnapshot, GameSummary, GameUpdate, MoveReply,
        PresenceAction,
    };
    use serde::de::{DeserializeOwned, IgnoredAny};
    use tracing::debug;

    use super::{ApiError, GameApi};

    /// [`GameApi`] over `reqwest`, authenticating with a bearer token.
    #[derive(Debug, Clone)]
    pub struct HttpGameApi {
        client: reqwest::Client,
        base: String,
        token: String,
    }

    impl HttpGameApi {
        pub fn new(api_base: &str, token: &str) -> Self {
            Self {
                client: reqwest::Client::new(),
                base: api_base.trim_end_matches('/').to_string(),
                token: token.to_string(),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base)
        }

        async fn send<T: DeserializeOwned>(
            &self,
            request: reqwest::RequestBuilder,
        ) -> Result<T, ApiError> {
            let response = request
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()));
            }

            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            debug!(status = status.as_u16(), error = %err, "request rejected");
            Err(err)
        }

        async fn update<T: DeserializeOwned>(
            &self,
            game_id: &str,
            update: &GameUpdate,
        ) -> Result<T, ApiError> {
            let request = self
                .client
                .put(self.url(&format!("/api/game/{game_id}")))
                .json(update);
            self.send(request).await
        }
    }

    impl GameApi for HttpGameApi {
        async fn list_active(&self) -> Result<Vec<GameSummary>, ApiError> {
            self.send(self.client.get(self.url("/api"))).await
        }

        async fn list_completed(&self) -> Result<Vec<CompletedGame>, ApiError> {
            self.send(self.client.get(self.url("/api/games"))).await
        }

        async fn fetch_game(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.send(self.client.get(self.url(&format!("/api/game/{game_id}"))))
                .await
        }

        async fn fetch_game_log(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.send(self.client.get(self.url(&format!("/api/game-log/{game_id}"))))
                .await
        }

        async fn create_game(&self, request: CreateGame) -> Result<GameSnapshot, ApiError> {
            self.send(self.client.post(self.url("/api")).json(&request))
                .await
        }

        async fn submit_move(
            &self,
            game_id: &str,
            position_id: &str,
        ) -> Result<MoveReply, ApiError> {
            let update = GameUpdate::Move {
                id: position_id.to_string(),
            };
            self.update(game_id, &update).await
        }

        async fn send_chat(&self, game_id: &str, message: &str) -> Result<(), ApiError> {
            let update = GameUpdate::Chat {
                msg: message.to_string(),
            };
            self.update::<IgnoredAny>(game_id, &update).await.map(|_| ())
        }

        async fn presence(&self, game_id: &str, action: PresenceAction) -> Result<(), ApiError> {
            let update = GameUpdate::Presence { action };
            self.update::<IgnoredAny>(game_id, &update).await.map(|_| ())
        }

        async fn reset(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.update(game_id, &GameUpdate::reset()).await
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted implementation for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use gomoku_core::protocol::{
        Color, CompletedGame, CreateGame, GameSnapshot, GameStatus, GameSummary, GameUpdate,
        MoveReply, PresenceAction,
    };

    use super::{ApiError, GameApi};

    #[derive(Default)]
    pub struct Script {
        pub active: Vec<GameSummary>,
        pub completed: Vec<CompletedGame>,
        pub games: HashMap<String, GameSnapshot>,
        pub move_replies: VecDeque<Result<MoveReply, ApiError>>,
        pub chat_replies: VecDeque<Result<(), ApiError>>,
        pub reset_replies: VecDeque<Result<GameSnapshot, ApiError>>,
        pub presence_replies: VecDeque<Result<(), ApiError>>,
        /// Every update sent, in order.
        pub updates: Vec<(String, GameUpdate)>,
        pub fetches: usize,
    }

    /// A [`GameApi`] that answers from a shared script.
    #[derive(Clone, Default)]
    pub struct FakeApi {
        pub script: Arc<Mutex<Script>>,
    }

    impl FakeApi {
        pub fn with_game(snapshot: GameSnapshot) -> Self {
            let api = Self::default();
            {
                let mut s = api.script.lock().unwrap();
                s.active.push(GameSummary {
                    id: snapshot.id.clone(),
                    game_number: snapshot.game_number,
                    size: snapshot.size,
                    is_multi: snapshot.is_multi,
                    created_at: None,
                    players: Vec::new(),
                });
                s.games.insert(snapshot.id.clone(), snapshot);
            }
            api
        }

        pub fn updates(&self) -> Vec<(String, GameUpdate)> {
            self.script.lock().unwrap().updates.clone()
        }

        pub fn presence_calls(&self, action: PresenceAction) -> usize {
            self.updates()
                .iter()
                .filter(|(_, u)| *u == GameUpdate::Presence { action })
                .count()
        }

        fn record(&self, game_id: &str, update: GameUpdate) {
            self.script
                .lock()
                .unwrap()
                .updates
                .push((game_id.to_string(), update));
        }

        fn game(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            let mut s = self.script.lock().unwrap();
            s.fetches += 1;
            s.games.get(game_id).cloned().ok_or(ApiError::Server {
                status: 404,
                message: "Game not found".into(),
            })
        }
    }

    impl GameApi for FakeApi {
        async fn list_active(&self) -> Result<Vec<GameSummary>, ApiError> {
            Ok(self.script.lock().unwrap().active.clone())
        }

        async fn list_completed(&self) -> Result<Vec<CompletedGame>, ApiError> {
            Ok(self.script.lock().unwrap().completed.clone())
        }

        async fn fetch_game(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.game(game_id)
        }

        async fn fetch_game_log(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.game(game_id)
        }

        async fn create_game(&self, request: CreateGame) -> Result<GameSnapshot, ApiError> {
            let [rows, cols] = request.size;
            let mut snap = crate::testing::empty_snapshot(rows, cols, request.is_multi);
            snap.id = "new".into();
            Ok(snap)
        }

        async fn submit_move(
            &self,
            game_id: &str,
            position_id: &str,
        ) -> Result<MoveReply, ApiError> {
            self.record(
                game_id,
                GameUpdate::Move {
                    id: position_id.to_string(),
                },
            );
            self.script
                .lock()
                .unwrap()
                .move_replies
                .pop_front()
                .unwrap_or(Ok(MoveReply {
                    status: GameStatus::Active,
                    player: Color::White,
                }))
        }

        async fn send_chat(&self, game_id: &str, message: &str) -> Result<(), ApiError> {
            self.record(
                game_id,
                GameUpdate::Chat {
                    msg: message.to_string(),
                },
            );
            self.script
                .lock()
                .unwrap()
                .chat_replies
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn presence(&self, game_id: &str, action: PresenceAction) -> Result<(), ApiError> {
            self.record(game_id, GameUpdate::Presence { action });
            self.script
                .lock()
                .unwrap()
                .presence_replies
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn reset(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
            self.record(game_id, GameUpdate::reset());
            let scripted = self.script.lock().unwrap().reset_replies.pop_front();
            match scripted {
                Some(reply) => reply,
                None => self.game(game_id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_messages_are_classified() {
        for msg in AUTH_ERRORS {
            let body = format!(r#"{{"error":"{msg}"}}"#);
            let err = ApiError::from_response(401, &body);
            assert!(err.is_auth(), "{msg} should be an auth error");
        }
    }

    #[test]
    fn other_failures_keep_status_and_message() {
        let err = ApiError::from_response(400, r#"{"message":"Position taken"}"#);
        assert_eq!(
            err,
            ApiError::Server {
                status: 400,
                message: "Position taken".into()
            }
        );
        assert!(!err.is_auth());
    }

    #[test]
    fn plain_text_and_empty_bodies() {
        assert_eq!(
            ApiError::from_response(401, "Invalid token"),
            ApiError::Auth("Invalid token".into())
        );
        let err = ApiError::from_response(502, "  ");
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
    }
}
