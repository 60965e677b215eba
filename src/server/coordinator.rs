//! Round coordinator: turns inbound protocol events into registry
//! transitions and outbound broadcasts.
//!
//! Every handler follows the same shape: await any external collaborator
//! first, then take the state lock once, validate, mutate and emit. The lock
//! is never held across an `.await` on the repository or the completion
//! service.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::completion::{command_prompt, CompletionService};
use crate::config::{BonusTiming, RoundSettings};
use crate::models::{QuizId, OPTION_COUNT};
use crate::protocol::{validate_name, ClientMessage, ServerMessage};
use crate::repository::{QuizRepository, RepositoryError};
use crate::session::{ConnectionId, Phase, Pin, PinExhausted, SessionId, SessionRegistry};

use super::hub::Outbox;
use super::scoring::{self, BASE_SCORE};
use super::state::ServerState;

/// Shared server state wrapped in Arc<Mutex> for async access.
pub type SharedState = Arc<Mutex<ServerState>>;

const HOST_SENDER: &str = "Host";
const ERROR_SENDER: &str = "Error";
const COMPLETION_FAILED: &str = "The assistant could not process the request.";

/// Why an inbound event had no effect.
#[derive(Debug, Error)]
pub enum HandleError {
    /// Unknown pin, quiz, session or participant. Reported to the sender.
    #[error("no game found")]
    NoGameFound,

    /// Stale or out-of-turn event. Dropped silently.
    #[error("ignored: {0}")]
    Ignored(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Pins(#[from] PinExhausted),
}

type HandleResult = Result<(), HandleError>;

/// The session state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    state: SharedState,
    repository: Arc<dyn QuizRepository>,
    completion: Arc<dyn CompletionService>,
    settings: RoundSettings,
}

impl Coordinator {
    pub fn new(
        repository: Arc<dyn QuizRepository>,
        completion: Arc<dyn CompletionService>,
        settings: RoundSettings,
    ) -> Self {
        Self::with_sessions(SessionRegistry::new(), repository, completion, settings)
    }

    /// Coordinator over a given (for instance seeded) session registry.
    pub fn with_sessions(
        sessions: SessionRegistry,
        repository: Arc<dyn QuizRepository>,
        completion: Arc<dyn CompletionService>,
        settings: RoundSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState::new(sessions))),
            repository,
            completion,
            settings,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Register a new connection and acknowledge it with its id.
    pub async fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        let mut state = self.state.lock().await;
        state.hub.register(id, outbox);
        state.hub.send(id, ServerMessage::ConnectionAck { connection_id: id });
        tracing::debug!(connection = %id, "connection registered");
        id
    }

    /// Process one inbound event from `from`.
    pub async fn handle(&self, from: ConnectionId, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::CreateSession { quiz_id } => self.create_session(from, quiz_id).await,
            ClientMessage::ResumeSession { previous_host_id } => {
                self.resume_session(from, previous_host_id).await
            }
            ClientMessage::StartGame => self.start_game(from).await,
            ClientMessage::AdvanceQuestion => self.advance_question(from).await,
            ClientMessage::TimeUp { question } => self.time_up(from, question).await,
            ClientMessage::RequestQuizCatalog => self.send_catalog(from).await,
            ClientMessage::JoinLobby { pin, name } => self.join_lobby(from, pin, name).await,
            ClientMessage::JoinGame {
                previous_connection_id,
            } => self.join_game(from, previous_connection_id).await,
            ClientMessage::SubmitAnswer { option } => self.submit_answer(from, option).await,
            ClientMessage::ReportElapsedTime {
                connection_id,
                remaining_seconds,
            } => self.report_time(from, connection_id, remaining_seconds).await,
            ClientMessage::RequestScore => self.send_score(from).await,
            ClientMessage::SendChat { text } => self.send_chat(from, text).await,
        };

        match result {
            Ok(()) => {}
            Err(HandleError::NoGameFound) => {
                tracing::debug!(connection = %from, "no game found");
                self.notify(from, ServerMessage::NoGameFound).await;
            }
            Err(HandleError::Ignored(reason)) => {
                tracing::debug!(connection = %from, reason, "event ignored");
            }
            Err(e) => {
                tracing::error!(connection = %from, "event failed: {}", e);
                self.notify(from, ServerMessage::NoGameFound).await;
            }
        }
    }

    async fn notify(&self, to: ConnectionId, msg: ServerMessage) {
        self.state.lock().await.hub.send(to, msg);
    }

    async fn create_session(&self, from: ConnectionId, quiz_id: QuizId) -> HandleResult {
        let quiz = self
            .repository
            .fetch_quiz(quiz_id)
            .await?
            .ok_or(HandleError::NoGameFound)?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.sessions.by_host(from).is_some() {
            return Err(HandleError::Ignored("connection already hosts a session"));
        }
        if state.participants.get(from).is_some() {
            return Err(HandleError::Ignored("players cannot host"));
        }

        let pin = state.sessions.allocate_pin()?;
        let session = state.sessions.create(pin, from, Arc::new(quiz)).id;
        state.hub.join(session, from);
        state.hub.send(from, ServerMessage::PinAssigned { pin });
        tracing::info!(%session, pin, quiz_id, "session created");
        Ok(())
    }

    async fn resume_session(&self, from: ConnectionId, previous: ConnectionId) -> HandleResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if previous != from && state.is_bound(from) {
            return Err(HandleError::Ignored("connection already belongs to a session"));
        }

        // The host index and the hub group are both updated before the lock
        // is released, so no event can see the session under the old host.
        let session = state
            .sessions
            .reassign_host(previous, from)
            .ok_or(HandleError::NoGameFound)?;
        if previous != from {
            state.hub.leave(previous);
        }
        state.hub.join(session, from);
        tracing::info!(%session, %previous, host = %from, "host resumed");

        if let Some(number) = state.resume_view(session, Instant::now()) {
            self.schedule_timeout(session, number);
        }
        Ok(())
    }

    async fn start_game(&self, from: ConnectionId) -> HandleResult {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .by_host_mut(from)
            .ok_or(HandleError::NoGameFound)?;
        session.is_running = true;
        let id = session.id;
        state.hub.send(from, ServerMessage::GameStarted { handle: from });
        tracing::info!(session = %id, "game started");
        Ok(())
    }

    async fn advance_question(&self, from: ConnectionId) -> HandleResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state.sessions.by_host(from).ok_or(HandleError::NoGameFound)?;
        let (id, phase, number) = (session.id, session.phase, session.next_question_number());

        if phase == Phase::GameOver {
            state.broadcast_game_over(id);
            return Ok(());
        }

        if state.start_question(id, number, Instant::now()) {
            tracing::debug!(session = %id, number, "question live");
            self.schedule_timeout(id, number);
        } else {
            tracing::info!(session = %id, "game over");
            state.finish_game(id);
        }
        Ok(())
    }

    async fn time_up(&self, from: ConnectionId, question: Option<usize>) -> HandleResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state.sessions.by_host(from).ok_or(HandleError::NoGameFound)?.id;
        match state.close_round(session, question) {
            Some(number) => {
                tracing::debug!(%session, number, "round closed by timeout");
                Ok(())
            }
            None => Err(HandleError::Ignored("round already closed")),
        }
    }

    /// Close question `number` of `session` if it is still live. Used by the
    /// server-side round timer.
    pub async fn expire_round(&self, session: SessionId, number: usize) -> bool {
        let closed = self.state.lock().await.close_round(session, Some(number));
        if closed.is_some() {
            tracing::debug!(%session, number, "round closed by server timer");
        }
        closed.is_some()
    }

    fn schedule_timeout(&self, session: SessionId, number: usize) {
        if !self.settings.auto_close {
            return;
        }
        let coordinator = self.clone();
        let delay = self.settings.question_time;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.expire_round(session, number).await;
        });
    }

    async fn send_catalog(&self, from: ConnectionId) -> HandleResult {
        let quizzes = self.repository.list_quizzes().await?;
        self.notify(from, ServerMessage::QuizCatalog { quizzes }).await;
        Ok(())
    }

    async fn join_lobby(&self, from: ConnectionId, pin: Pin, name: String) -> HandleResult {
        if let Err(reason) = validate_name(&name) {
            self.notify(
                from,
                ServerMessage::JoinRejected {
                    reason: reason.to_string(),
                },
            )
            .await;
            return Ok(());
        }
        let name = name.trim().to_string();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state.sessions.by_pin(pin).ok_or(HandleError::NoGameFound)?.id;
        if state.sessions.by_host(from).is_some() {
            return Err(HandleError::Ignored("hosts cannot join as players"));
        }
        if state.participants.get(from).is_some() {
            return Err(HandleError::Ignored("connection already joined"));
        }

        state.participants.add(session, from, name);
        state.hub.join(session, from);
        state.broadcast_roster(session);
        tracing::info!(%session, player = %from, "player joined");
        Ok(())
    }

    async fn join_game(&self, from: ConnectionId, previous: ConnectionId) -> HandleResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if previous != from && state.is_bound(from) {
            return Err(HandleError::Ignored("connection already belongs to a session"));
        }
        let session = state
            .participants
            .get(previous)
            .ok_or(HandleError::NoGameFound)?
            .session;
        if state.sessions.get(session).is_none() {
            return Err(HandleError::NoGameFound);
        }

        if previous != from {
            state.participants.rebind(previous, from);
            state.hub.leave(previous);
        }
        state.hub.join(session, from);
        state.hub.send(
            from,
            ServerMessage::PlayerGameData {
                players: state.roster(session),
            },
        );
        tracing::debug!(%session, %previous, player = %from, "player resumed");
        Ok(())
    }

    async fn submit_answer(&self, from: ConnectionId, option: u8) -> HandleResult {
        if !(1..=OPTION_COUNT as u8).contains(&option) {
            return Err(HandleError::Ignored("option out of range"));
        }
        let now = Instant::now();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let participant = state.participants.get(from).ok_or(HandleError::NoGameFound)?;
        let session_id = participant.session;
        if participant.has_answered() {
            return Err(HandleError::Ignored("already answered"));
        }
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or(HandleError::NoGameFound)?;
        if !session.round.live {
            return Err(HandleError::Ignored("round not live"));
        }
        let correct = session
            .current_question()
            .ok_or(HandleError::Ignored("no question on screen"))?
            .is_correct(option);
        let remaining = session.remaining_fraction(now, self.settings.question_time);
        session.round.answered += 1;
        let answered = session.round.answered;

        let participant = state
            .participants
            .get_mut(from)
            .ok_or(HandleError::NoGameFound)?;
        participant.last_answer = Some(option);
        if correct {
            match self.settings.bonus_timing {
                BonusTiming::Server => {
                    participant.award(BASE_SCORE + scoring::time_bonus(remaining));
                }
                BonusTiming::ClientReported => {
                    participant.award(BASE_SCORE);
                    participant.bonus_pending = true;
                    let connection_id = participant.connection();
                    state
                        .hub
                        .broadcast(session_id, ServerMessage::TimeBonusRequest { connection_id });
                }
            }
        }
        state.hub.send(from, ServerMessage::AnswerResult { correct });

        let total = state.participants.count_for_session(session_id);
        if state.close_round_if_complete(session_id).is_none() {
            state
                .hub
                .broadcast(session_id, ServerMessage::LiveTally { answered, total });
        }
        Ok(())
    }

    async fn report_time(
        &self,
        from: ConnectionId,
        player: ConnectionId,
        remaining_seconds: f64,
    ) -> HandleResult {
        if self.settings.bonus_timing != BonusTiming::ClientReported {
            return Err(HandleError::Ignored("time bonus is measured by the server"));
        }
        let question_secs = self.settings.question_time.as_secs_f64();
        if !remaining_seconds.is_finite() || question_secs <= 0.0 {
            return Err(HandleError::Ignored("unusable time report"));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state
            .participants
            .get(player)
            .ok_or(HandleError::NoGameFound)?
            .session;
        let host = state
            .sessions
            .get(session)
            .ok_or(HandleError::NoGameFound)?
            .host();
        if from != host && from != player {
            return Err(HandleError::Ignored("reporter is neither host nor player"));
        }

        let participant = state
            .participants
            .get_mut(player)
            .ok_or(HandleError::NoGameFound)?;
        if !participant.bonus_pending {
            return Err(HandleError::Ignored("no bonus pending"));
        }
        participant.bonus_pending = false;
        participant.award(scoring::time_bonus(remaining_seconds / question_secs));
        Ok(())
    }

    async fn send_score(&self, from: ConnectionId) -> HandleResult {
        let state = self.state.lock().await;
        let score = state
            .participants
            .get(from)
            .ok_or(HandleError::NoGameFound)?
            .score;
        state.hub.send(from, ServerMessage::ScoreUpdate { score });
        Ok(())
    }

    async fn send_chat(&self, from: ConnectionId, text: String) -> HandleResult {
        if text.trim().is_empty() {
            return Err(HandleError::Ignored("empty chat message"));
        }

        let (session, sender) = {
            let state = self.state.lock().await;
            if let Some(participant) = state.participants.get(from) {
                (participant.session, participant.name.clone())
            } else if let Some(session) = state.sessions.by_host(from) {
                (session.id, HOST_SENDER.to_string())
            } else {
                return Err(HandleError::NoGameFound);
            }
        };

        let msg = match command_prompt(&text) {
            Some(prompt) => match self.completion.complete(prompt).await {
                Ok(reply) => ServerMessage::ChatMessage {
                    sender: format!("({}) bot", sender),
                    text: format!("{}:\n{}", text, reply),
                },
                Err(e) => {
                    tracing::warn!(%session, "completion failed: {}", e);
                    ServerMessage::ChatMessage {
                        sender: ERROR_SENDER.to_string(),
                        text: COMPLETION_FAILED.to_string(),
                    }
                }
            },
            None => ServerMessage::ChatMessage { sender, text },
        };

        // The session may have closed while the completion was pending.
        let state = self.state.lock().await;
        if state.sessions.get(session).is_some() {
            state.hub.broadcast(session, msg);
        }
        Ok(())
    }

    /// Tear down after a connection closed.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.hub.unregister(conn);

        if let Some(session) = state.sessions.by_host(conn) {
            let (id, quiz_id) = (session.id, session.quiz_id());
            // A finished game has nothing left to resume into
            let keep = session.is_running && session.phase != Phase::GameOver;
            if keep {
                state
                    .hub
                    .broadcast(id, ServerMessage::HostLeft { session_closed: false });
                tracing::info!(session = %id, "host disconnected, waiting for resume");
            } else {
                state.sessions.remove(id);
                let removed = state.participants.remove_session(id);
                state
                    .hub
                    .broadcast(id, ServerMessage::HostLeft { session_closed: true });
                state.hub.dissolve(id);
                tracing::info!(session = %id, quiz_id, players = removed.len(), "session closed");
            }
            return;
        }

        let Some(participant) = state.participants.get(conn) else {
            return;
        };
        let session = participant.session;
        match state.sessions.get(session) {
            Some(s) if s.is_running => {
                tracing::debug!(%session, player = %conn, "player dropped, score kept");
            }
            Some(_) => {
                if let Some(removed) = state.participants.remove(conn) {
                    if removed.has_answered() {
                        if let Some(s) = state.sessions.get_mut(session) {
                            if s.round.live {
                                s.round.answered = s.round.answered.saturating_sub(1);
                            }
                        }
                    }
                }
                state.broadcast_roster(session);
                state.close_round_if_complete(session);
                tracing::info!(%session, player = %conn, "player left lobby");
            }
            None => {
                state.participants.remove(conn);
            }
        }
    }
}
