//! Optimistic chat sending.

use gomoku_core::frames::ChatFrame;
use gomoku_core::session::{ChatMessage, GameSession};
use thiserror::Error;

use crate::config::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatRejected {
    #[error("message is empty")]
    Empty,
    #[error("previous message is still being sent")]
    Busy,
    #[error("the session has expired")]
    SessionExpired,
}

/// A chat line shown locally and waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAttempt {
    pub message: ChatMessage,
    /// Where the line sits in the session's message list.
    slot: usize,
}

impl ChatAttempt {
    /// The frame that relays this line to the opponent once persisted.
    pub fn frame(&self) -> ChatFrame {
        ChatFrame {
            user_id: self.message.user_id.clone(),
            user_name: self.message.user_name.clone(),
            message: self.message.message.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatRelay {
    in_flight: Option<ChatAttempt>,
}

impl ChatRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append `text` from `author` optimistically.
    pub fn begin_send(
        &mut self,
        session: &mut GameSession,
        author: &Identity,
        text: &str,
    ) -> Result<ChatAttempt, ChatRejected> {
        if text.trim().is_empty() {
            return Err(ChatRejected::Empty);
        }
        if self.in_flight.is_some() {
            return Err(ChatRejected::Busy);
        }

        let attempt = ChatAttempt {
            message: ChatMessage {
                user_id: author.user_id.clone(),
                user_name: author.user_name.clone(),
                message: text.to_string(),
            },
            slot: session.messages.len(),
        };
        session.messages.push(attempt.message.clone());
        self.in_flight = Some(attempt.clone());
        Ok(attempt)
    }

    /// The server stored the line.
    pub fn confirm(&mut self) -> Option<ChatAttempt> {
        self.in_flight.take()
    }

    /// The server refused the line: withdraw it. Lines received from the
    /// opponent in the meantime stay.
    pub fn fail(&mut self, session: &mut GameSession) -> Option<ChatAttempt> {
        let attempt = self.in_flight.take()?;
        let found = session
            .messages
            .iter()
            .enumerate()
            .skip(attempt.slot)
            .find(|(_, m)| **m == attempt.message)
            .map(|(i, _)| i);
        if let Some(i) = found {
            session.messages.remove(i);
        }
        Some(attempt)
    }
}
