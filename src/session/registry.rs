use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::models::{Question, Quiz};

use super::ids::{ConnectionId, Pin, SessionId, PIN_MAX, PIN_MIN};

/// Random draws attempted before giving up on finding a free pin.
const PIN_ATTEMPTS: usize = 64;

#[derive(Debug, Error)]
#[error("no free pin found after {0} attempts")]
pub struct PinExhausted(pub usize);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Players are joining.
    Lobby,
    /// The host is showing slides before the first question.
    Presenting,
    /// A question is on screen, live or closed (see [`RoundState::live`]).
    Question,
    /// The final ranking has been shown.
    GameOver,
}

/// Per-question state.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    /// 1-based number of the current question, 0 before the first one.
    pub number: usize,
    /// Whether answers are currently accepted.
    pub live: bool,
    /// Answers accepted for the current question.
    pub answered: usize,
    /// When the current question went live.
    pub started_at: Option<Instant>,
}

/// One quiz session: a host connection, a pin and round state.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub pin: Pin,
    host: ConnectionId,
    /// Snapshot of the quiz content taken when the session was created.
    pub quiz: Arc<Quiz>,
    pub is_running: bool,
    pub phase: Phase,
    pub round: RoundState,
}

impl Session {
    /// Current host connection.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    pub fn quiz_id(&self) -> crate::models::QuizId {
        self.quiz.id
    }

    /// Number the next advance will move to. A session that has not shown
    /// a question yet moves to question 1.
    pub fn next_question_number(&self) -> usize {
        if self.round.number == 0 {
            1
        } else {
            self.round.number + 1
        }
    }

    /// The question currently on screen.
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question(self.round.number)
    }

    /// Put question `number` live with a fresh tally.
    pub fn begin_question(&mut self, number: usize, now: Instant) {
        self.phase = Phase::Question;
        self.round = RoundState {
            number,
            live: true,
            answered: 0,
            started_at: Some(now),
        };
    }

    pub fn begin_presenting(&mut self) {
        self.phase = Phase::Presenting;
        self.round.live = false;
    }

    pub fn finish(&mut self) {
        self.phase = Phase::GameOver;
        self.round.live = false;
    }

    /// Close the live round. Returns the closed question number the first
    /// time only; every later call (or a call naming another question)
    /// returns `None`.
    pub fn close_round(&mut self, expected: Option<usize>) -> Option<usize> {
        if self.phase != Phase::Question || !self.round.live {
            return None;
        }
        if expected.is_some_and(|n| n != self.round.number) {
            return None;
        }
        self.round.live = false;
        Some(self.round.number)
    }

    /// Fraction of the question time left at `now`, in `[0, 1]`.
    pub fn remaining_fraction(&self, now: Instant, question_time: Duration) -> f64 {
        let Some(started) = self.round.started_at else {
            return 0.0;
        };
        if question_time.is_zero() {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(started);
        let remaining = question_time.saturating_sub(elapsed);
        (remaining.as_secs_f64() / question_time.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// Owner of every live session.
///
/// Sessions are keyed by their stable [`SessionId`], with secondary
/// indexes by current host connection and by pin.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    by_host: HashMap<ConnectionId, SessionId>,
    by_pin: HashMap<Pin, SessionId>,
    rng: StdRng,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Registry with a deterministic pin sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            sessions: HashMap::new(),
            by_host: HashMap::new(),
            by_pin: HashMap::new(),
            rng,
        }
    }

    /// Draw a pin not used by any live session.
    pub fn allocate_pin(&mut self) -> Result<Pin, PinExhausted> {
        for _ in 0..PIN_ATTEMPTS {
            let pin = self.rng.gen_range(PIN_MIN..=PIN_MAX);
            if !self.by_pin.contains_key(&pin) {
                return Ok(pin);
            }
        }
        Err(PinExhausted(PIN_ATTEMPTS))
    }

    /// Register a new session in the lobby phase. `pin` should come from
    /// [`allocate_pin`](Self::allocate_pin).
    pub fn create(&mut self, pin: Pin, host: ConnectionId, quiz: Arc<Quiz>) -> &Session {
        let id = SessionId::new();
        if let Some(previous) = self.by_pin.insert(pin, id) {
            tracing::warn!(%pin, %previous, "pin reused while still live; newest session wins");
        }
        self.by_host.insert(host, id);
        self.sessions.entry(id).or_insert(Session {
            id,
            pin,
            host,
            quiz,
            is_running: false,
            phase: Phase::Lobby,
            round: RoundState::default(),
        })
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Session currently hosted by `host`.
    pub fn by_host(&self, host: ConnectionId) -> Option<&Session> {
        self.by_host.get(&host).and_then(|id| self.sessions.get(id))
    }

    pub fn by_host_mut(&mut self, host: ConnectionId) -> Option<&mut Session> {
        let id = *self.by_host.get(&host)?;
        self.sessions.get_mut(&id)
    }

    pub fn by_pin(&self, pin: Pin) -> Option<&Session> {
        self.by_pin.get(&pin).and_then(|id| self.sessions.get(id))
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.by_host.remove(&session.host);
        if self.by_pin.get(&session.pin) == Some(&id) {
            self.by_pin.remove(&session.pin);
        }
        Some(session)
    }

    pub fn remove_by_host(&mut self, host: ConnectionId) -> Option<Session> {
        let id = *self.by_host.get(&host)?;
        self.remove(id)
    }

    /// Move the session hosted by `old` to the `new` connection.
    pub fn reassign_host(&mut self, old: ConnectionId, new: ConnectionId) -> Option<SessionId> {
        let id = self.by_host.remove(&old)?;
        let Some(session) = self.sessions.get_mut(&id) else {
            return None;
        };
        session.host = new;
        self.by_host.insert(new, id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;

    fn quiz() -> Arc<Quiz> {
        let q = Question {
            text: "?".to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct: 2,
        };
        Arc::new(Quiz {
            id: 7,
            name: "test".to_string(),
            questions: vec![q.clone(), q],
            slides: Vec::new(),
        })
    }

    #[test]
    fn test_create_and_lookup() {
        let mut registry = SessionRegistry::with_seed(1);
        let host = ConnectionId::new();
        let pin = registry.allocate_pin().unwrap();
        assert!((PIN_MIN..=PIN_MAX).contains(&pin));

        let id = registry.create(pin, host, quiz()).id;
        let session = registry.by_host(host).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.phase, Phase::Lobby);
        assert!(!session.is_running);
        assert_eq!(session.quiz_id(), 7);
        assert_eq!(registry.by_pin(pin).unwrap().id, id);
        assert!(registry.by_host(ConnectionId::new()).is_none());
    }

    #[test]
    fn test_allocated_pins_are_unique_among_live_sessions() {
        let mut registry = SessionRegistry::with_seed(42);
        let mut pins = std::collections::HashSet::new();
        for _ in 0..500 {
            let pin = registry.allocate_pin().unwrap();
            registry.create(pin, ConnectionId::new(), quiz());
            assert!(pins.insert(pin), "pin {} handed out twice", pin);
        }
    }

    #[test]
    fn test_remove_by_host_frees_pin() {
        let mut registry = SessionRegistry::with_seed(3);
        let host = ConnectionId::new();
        let pin = registry.allocate_pin().unwrap();
        registry.create(pin, host, quiz());

        let removed = registry.remove_by_host(host).unwrap();
        assert_eq!(removed.pin, pin);
        assert!(registry.by_pin(pin).is_none());
        assert!(registry.by_host(host).is_none());
        assert!(registry.remove_by_host(host).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reassign_host() {
        let mut registry = SessionRegistry::with_seed(4);
        let old = ConnectionId::new();
        let new = ConnectionId::new();
        let pin = registry.allocate_pin().unwrap();
        let id = registry.create(pin, old, quiz()).id;

        assert_eq!(registry.reassign_host(old, new), Some(id));
        assert!(registry.by_host(old).is_none());
        assert_eq!(registry.by_host(new).unwrap().host(), new);
        assert_eq!(registry.reassign_host(old, ConnectionId::new()), None);
    }

    #[test]
    fn test_close_round_is_one_shot() {
        let mut registry = SessionRegistry::with_seed(5);
        let host = ConnectionId::new();
        let pin = registry.allocate_pin().unwrap();
        registry.create(pin, host, quiz());
        let session = registry.by_host_mut(host).unwrap();

        assert_eq!(session.close_round(None), None);
        assert_eq!(session.next_question_number(), 1);
        session.begin_question(1, Instant::now());
        assert_eq!(session.close_round(Some(2)), None);
        assert_eq!(session.close_round(Some(1)), Some(1));
        assert_eq!(session.close_round(None), None);
        assert_eq!(session.close_round(Some(1)), None);
        assert_eq!(session.next_question_number(), 2);
    }

    #[test]
    fn test_remaining_fraction() {
        let mut registry = SessionRegistry::with_seed(6);
        let host = ConnectionId::new();
        let pin = registry.allocate_pin().unwrap();
        registry.create(pin, host, quiz());
        let session = registry.by_host_mut(host).unwrap();

        let start = Instant::now();
        let budget = Duration::from_secs(20);
        assert_eq!(session.remaining_fraction(start, budget), 0.0);

        session.begin_question(1, start);
        let quarter = session.remaining_fraction(start + Duration::from_secs(15), budget);
        assert!((quarter - 0.25).abs() < 1e-9);
        assert_eq!(session.remaining_fraction(start + Duration::from_secs(30), budget), 0.0);
        assert_eq!(session.remaining_fraction(start, budget), 1.0);
    }
}
