//! Server state management.
//!
//! Both registries and the outbound hub live in one [`ServerState`], guarded
//! by a single lock. Every round transition below runs entirely inside one
//! lock acquisition, so other events can never observe it half done.

use std::time::Instant;

use crate::protocol::{PlayerEntry, ServerMessage};
use crate::session::{ConnectionId, ParticipantRegistry, Phase, SessionId, SessionRegistry};

use super::hub::Hub;
use super::scoring;

/// Main server state.
#[derive(Default)]
pub struct ServerState {
    pub sessions: SessionRegistry,
    pub participants: ParticipantRegistry,
    pub hub: Hub,
}

impl ServerState {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self {
            sessions,
            participants: ParticipantRegistry::new(),
            hub: Hub::new(),
        }
    }

    /// Whether `conn` already hosts a session or plays in one.
    pub fn is_bound(&self, conn: ConnectionId) -> bool {
        self.sessions.by_host(conn).is_some() || self.participants.get(conn).is_some()
    }

    /// Roster of a session in join order.
    pub fn roster(&self, session: SessionId) -> Vec<PlayerEntry> {
        scoring::roster(&self.participants.for_session(session))
    }

    pub fn broadcast_roster(&self, session: SessionId) {
        self.hub.broadcast(
            session,
            ServerMessage::RosterUpdated {
                players: self.roster(session),
            },
        );
    }

    /// Payload of the question currently on screen.
    pub fn question_payload(&self, session: SessionId) -> Option<ServerMessage> {
        let session_ref = self.sessions.get(session)?;
        let question = session_ref.current_question()?;
        Some(ServerMessage::QuestionPayload {
            number: session_ref.round.number,
            total: session_ref.quiz.question_count(),
            text: question.text.clone(),
            options: question.options.clone(),
            participant_count: self.participants.count_for_session(session),
        })
    }

    /// Put question `number` live: clear every answer, reset the tally and
    /// broadcast the question. Returns false if the quiz has no such question.
    pub fn start_question(&mut self, session: SessionId, number: usize, now: Instant) -> bool {
        let Some(session_mut) = self.sessions.get_mut(session) else {
            return false;
        };
        if session_mut.quiz.question(number).is_none() {
            return false;
        }
        session_mut.begin_question(number, now);
        self.participants.reset_answers(session);

        if let Some(payload) = self.question_payload(session) {
            self.hub.broadcast(session, payload);
        }
        true
    }

    /// Close the live round once and broadcast its summary. Returns the
    /// closed question number, or `None` if the round was not live (or was
    /// another question than `expected`).
    pub fn close_round(&mut self, session: SessionId, expected: Option<usize>) -> Option<usize> {
        let number = self.sessions.get_mut(session)?.close_round(expected)?;

        let session_ref = self.sessions.get(session)?;
        let question = session_ref.current_question()?;
        let summary = scoring::round_summary(number, question, &self.participants.for_session(session));
        self.hub.broadcast(session, summary);
        Some(number)
    }

    /// Close the round if every participant has answered.
    pub fn close_round_if_complete(&mut self, session: SessionId) -> Option<usize> {
        let round = &self.sessions.get(session)?.round;
        let (live, answered, number) = (round.live, round.answered, round.number);
        let total = self.participants.count_for_session(session);
        if live && total > 0 && answered >= total {
            self.close_round(session, Some(number))
        } else {
            None
        }
    }

    /// Move to the final ranking and broadcast it.
    pub fn finish_game(&mut self, session: SessionId) {
        if let Some(session_mut) = self.sessions.get_mut(session) {
            session_mut.finish();
            self.broadcast_game_over(session);
        }
    }

    pub fn broadcast_game_over(&self, session: SessionId) {
        let top = scoring::ranking(&self.participants.for_session(session));
        self.hub.broadcast(session, ServerMessage::GameOver { top });
    }

    pub fn broadcast_slides(&self, session: SessionId) {
        if let Some(session_ref) = self.sessions.get(session) {
            self.hub.broadcast(
                session,
                ServerMessage::PresentationSlides {
                    urls: session_ref.quiz.slides.clone(),
                },
            );
        }
    }

    /// Replay the current view of a session to its group after a host resume.
    /// Returns the question number if this put a new question live.
    pub fn resume_view(&mut self, session: SessionId, now: Instant) -> Option<usize> {
        let session_ref = self.sessions.get(session)?;
        let (phase, has_slides) = (session_ref.phase, session_ref.quiz.has_slides());
        match phase {
            Phase::Lobby if has_slides => {
                self.sessions.get_mut(session)?.begin_presenting();
                self.broadcast_slides(session);
                None
            }
            Phase::Lobby => self.start_question(session, 1, now).then_some(1),
            Phase::Presenting => {
                self.broadcast_slides(session);
                None
            }
            Phase::Question => {
                if let Some(payload) = self.question_payload(session) {
                    self.hub.broadcast(session, payload);
                }
                None
            }
            Phase::GameOver => {
                self.broadcast_game_over(session);
                None
            }
        }
    }
}
