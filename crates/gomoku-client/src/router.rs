//! Applies decoded realtime frames to the session.

use gomoku_core::frames::{self, FrameError, InboundFrame, MoveFrame, PresenceFrame};
use gomoku_core::protocol::{Color, PositionStatus};
use gomoku_core::session::{ChatMessage, GameSession, PlayerSlot};
use gomoku_core::turn;
use tracing::{debug, warn};

use crate::events::{SessionEvent, StateChanged};

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// A ping addressed to us; the caller re-arms its ping timeout.
    Heartbeat,
    Applied {
        changed: StateChanged,
        event: Option<SessionEvent>,
    },
    /// Not for us, an echo of our own action, or malformed.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct EventRouter {
    self_id: String,
}

impl EventRouter {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
        }
    }

    /// Decode and route a raw frame. Undecodable input is dropped with a warning.
    pub fn route_text(&self, session: &mut GameSession, raw: &str) -> Routed {
        match frames::decode(raw) {
            Ok(frame) => self.route(session, frame),
            Err(FrameError::UnknownAction(action)) => {
                debug!(%action, "ignoring unknown action");
                Routed::Ignored
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                Routed::Ignored
            }
        }
    }

    pub fn route(&self, session: &mut GameSession, frame: InboundFrame) -> Routed {
        let kind = frame.kind();
        match frame {
            InboundFrame::Ping { user_id } if user_id == self.self_id => Routed::Heartbeat,
            InboundFrame::Ping { .. } => Routed::Ignored,

            InboundFrame::Chat(chat) => {
                if chat.user_id == self.self_id {
                    return Routed::Ignored;
                }
                session.messages.push(ChatMessage {
                    user_id: chat.user_id,
                    user_name: chat.user_name.clone(),
                    message: chat.message.clone(),
                });
                Routed::Applied {
                    changed: StateChanged {
                        chat: true,
                        ..Default::default()
                    },
                    event: Some(SessionEvent::ChatReceived {
                        name: chat.user_name,
                        message: chat.message,
                    }),
                }
            }

            InboundFrame::Join(p) | InboundFrame::Reenter(p) | InboundFrame::Rest(p)
            | InboundFrame::Leave(p)
                if self.is_own(p.updated_by.as_deref()) =>
            {
                debug!(kind, "ignoring echo of own action");
                Routed::Ignored
            }
            InboundFrame::Move(ref m) if self.is_own(m.updated_by.as_deref()) => {
                debug!(kind, "ignoring echo of own move");
                Routed::Ignored
            }

            InboundFrame::Join(p) => {
                let name = self.opponent_name(&p, session);
                session.replace_players(p.players);
                Routed::Applied {
                    changed: StateChanged {
                        players: true,
                        ..Default::default()
                    },
                    event: Some(SessionEvent::OpponentJoined { name }),
                }
            }
            InboundFrame::Reenter(p) => Routed::Applied {
                changed: StateChanged::default(),
                event: Some(SessionEvent::OpponentReentered {
                    name: self.opponent_name(&p, session),
                }),
            },
            InboundFrame::Rest(p) => Routed::Applied {
                changed: StateChanged::default(),
                event: Some(SessionEvent::OpponentResting {
                    name: self.opponent_name(&p, session),
                }),
            },
            InboundFrame::Leave(p) => self.apply_leave(session, p),
            InboundFrame::Move(m) => self.apply_move(session, m),
        }
    }

    fn is_own(&self, updated_by: Option<&str>) -> bool {
        updated_by == Some(self.self_id.as_str())
    }

    /// Display name of whoever triggered a presence frame.
    fn opponent_name(&self, frame: &PresenceFrame, session: &GameSession) -> String {
        let from_frame = frame
            .players
            .iter()
            .find(|p| Some(p.user_id.as_str()) == frame.updated_by.as_deref())
            .or_else(|| frame.players.iter().find(|p| p.user_id != self.self_id))
            .map(|p| p.user_name.clone());
        from_frame
            .or_else(|| session.opponent_of(&self.self_id).map(|p| p.user_name.clone()))
            .unwrap_or_else(|| "opponent".to_string())
    }

    fn apply_leave(&self, session: &mut GameSession, frame: PresenceFrame) -> Routed {
        let name = self.opponent_name(&frame, session);
        match frame.updated_by.as_deref() {
            Some(leaver) => session.players.retain(|p| p.user_id != leaver),
            None => session.players.retain(|p| p.user_id == self.self_id),
        }

        let mut changed = StateChanged {
            players: true,
            ..Default::default()
        };
        if !session.has_moves() {
            let next = turn::whose_turn(session);
            changed.turn = next != session.current_player;
            session.current_player = next;
        }
        Routed::Applied {
            changed,
            event: Some(SessionEvent::OpponentLeft { name }),
        }
    }

    fn apply_move(&self, session: &mut GameSession, frame: MoveFrame) -> Routed {
        let index = session
            .position_index(&frame.selected_pos_id)
            .unwrap_or(frame.selected_position_index);
        let Some(current) = session.status_at(index) else {
            warn!(index, position = %frame.selected_pos_id, "move for a position not on this board");
            return Routed::Ignored;
        };

        let mover = self.mover_color(&frame);
        let name = frame
            .players
            .iter()
            .find(|p| Some(p.user_id.as_str()) == frame.updated_by.as_deref())
            .map(|p| p.user_name.clone())
            .or_else(|| session.opponent_of(&self.self_id).map(|p| p.user_name.clone()))
            .unwrap_or_else(|| "opponent".to_string());

        let mut changed = StateChanged::default();
        match current {
            // The server gave our unconfirmed cell to the opponent.
            PositionStatus::Pending => {
                session.unplace(index);
                changed.board |= session.place(index, mover.into());
            }
            PositionStatus::None => {
                changed.board |= session.place(index, mover.into());
            }
            // Already applied; a duplicate frame only refreshes status and turn.
            PositionStatus::Black | PositionStatus::White => {}
        }

        changed.status = session.status != frame.status;
        changed.turn = session.current_player != frame.player;
        session.status = frame.status;
        session.current_player = frame.player;
        if !frame.players.is_empty() {
            let players: Vec<PlayerSlot> = frame.players.into_iter().map(Into::into).collect();
            if players != session.players {
                session.players = players;
                changed.players = true;
            }
        }

        if !changed.any() {
            return Routed::Ignored;
        }
        Routed::Applied {
            changed,
            event: Some(SessionEvent::OpponentMoved { name, index }),
        }
    }

    /// Colour of the stone the opponent just placed.
    fn mover_color(&self, frame: &MoveFrame) -> Color {
        frame
            .players
            .iter()
            .find(|p| Some(p.user_id.as_str()) == frame.updated_by.as_deref())
            .or_else(|| frame.players.iter().find(|p| p.user_id != self.self_id))
            .map_or_else(|| frame.player.opposite(), |p| p.color)
    }
}
