use std::collections::HashMap;

use super::ids::{ConnectionId, SessionId};

/// One joined player.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Owning session.
    pub session: SessionId,
    connection: ConnectionId,
    pub name: String,
    pub score: u64,
    /// Option submitted for the current question, if any.
    pub last_answer: Option<u8>,
    /// A correct answer is waiting for its client-reported time bonus.
    pub bonus_pending: bool,
}

impl Participant {
    /// Current connection of this player.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn has_answered(&self) -> bool {
        self.last_answer.is_some()
    }

    /// Add points. Scores only ever grow.
    pub fn award(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }
}

/// Owner of every participant, keyed by current connection, with a
/// per-session index in join order.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ConnectionId, Participant>,
    by_session: HashMap<SessionId, Vec<ConnectionId>>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to `session`. A connection already registered is moved
    /// to the new session.
    pub fn add(&mut self, session: SessionId, connection: ConnectionId, name: String) -> &Participant {
        self.remove(connection);
        self.by_session.entry(session).or_default().push(connection);
        self.participants.entry(connection).or_insert(Participant {
            session,
            connection,
            name,
            score: 0,
            last_answer: None,
            bonus_pending: false,
        })
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&Participant> {
        self.participants.get(&connection)
    }

    pub fn get_mut(&mut self, connection: ConnectionId) -> Option<&mut Participant> {
        self.participants.get_mut(&connection)
    }

    /// Participants of `session` in join order.
    pub fn for_session(&self, session: SessionId) -> Vec<&Participant> {
        self.by_session
            .get(&session)
            .map(|ids| ids.iter().filter_map(|id| self.participants.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn count_for_session(&self, session: SessionId) -> usize {
        self.by_session.get(&session).map_or(0, Vec::len)
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(&connection)?;
        if let Some(ids) = self.by_session.get_mut(&participant.session) {
            ids.retain(|id| *id != connection);
            if ids.is_empty() {
                self.by_session.remove(&participant.session);
            }
        }
        Some(participant)
    }

    /// Drop every participant of `session`, returning them in join order.
    pub fn remove_session(&mut self, session: SessionId) -> Vec<Participant> {
        self.by_session
            .remove(&session)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.participants.remove(&id))
            .collect()
    }

    /// Move a player from connection `old` to `new`, keeping its place in
    /// the join order.
    pub fn rebind(&mut self, old: ConnectionId, new: ConnectionId) -> Option<&Participant> {
        if old != new && self.participants.contains_key(&new) {
            self.remove(new);
        }
        let mut participant = self.participants.remove(&old)?;
        participant.connection = new;
        if let Some(slot) = self
            .by_session
            .get_mut(&participant.session)
            .and_then(|ids| ids.iter_mut().find(|id| **id == old))
        {
            *slot = new;
        }
        Some(self.participants.entry(new).or_insert(participant))
    }

    /// Clear every answer of `session` ahead of a new question.
    pub fn reset_answers(&mut self, session: SessionId) {
        if let Some(ids) = self.by_session.get(&session) {
            for id in ids {
                if let Some(p) = self.participants.get_mut(id) {
                    p.last_answer = None;
                    p.bonus_pending = false;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(registry: &ParticipantRegistry, session: SessionId) -> Vec<String> {
        registry
            .for_session(session)
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn test_join_order_per_session() {
        let mut registry = ParticipantRegistry::new();
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        registry.add(s1, ConnectionId::new(), "Ana".into());
        registry.add(s2, ConnectionId::new(), "Bo".into());
        registry.add(s1, ConnectionId::new(), "Cy".into());
        registry.add(s1, ConnectionId::new(), "Ana".into());

        assert_eq!(names(&registry, s1), vec!["Ana", "Cy", "Ana"]);
        assert_eq!(names(&registry, s2), vec!["Bo"]);
        assert_eq!(registry.count_for_session(s1), 3);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_remove() {
        let mut registry = ParticipantRegistry::new();
        let session = SessionId::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.add(session, a, "A".into());
        registry.add(session, b, "B".into());

        assert_eq!(registry.remove(a).unwrap().name, "A");
        assert!(registry.remove(a).is_none());
        assert_eq!(names(&registry, session), vec!["B"]);
        assert!(registry.get(a).is_none());
    }

    #[test]
    fn test_remove_session() {
        let mut registry = ParticipantRegistry::new();
        let gone = SessionId::new();
        let kept = SessionId::new();
        registry.add(gone, ConnectionId::new(), "A".into());
        registry.add(kept, ConnectionId::new(), "B".into());
        registry.add(gone, ConnectionId::new(), "C".into());

        let removed: Vec<_> = registry.remove_session(gone).into_iter().map(|p| p.name).collect();
        assert_eq!(removed, vec!["A", "C"]);
        assert_eq!(registry.count_for_session(gone), 0);
        assert_eq!(names(&registry, kept), vec!["B"]);
    }

    #[test]
    fn test_rebind_keeps_order_and_score() {
        let mut registry = ParticipantRegistry::new();
        let session = SessionId::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.add(session, a, "A".into());
        registry.add(session, b, "B".into());
        registry.get_mut(a).unwrap().award(150);

        let fresh = ConnectionId::new();
        let rebound = registry.rebind(a, fresh).unwrap();
        assert_eq!(rebound.connection(), fresh);
        assert_eq!(rebound.score, 150);
        assert!(registry.get(a).is_none());
        assert_eq!(names(&registry, session), vec!["A", "B"]);
        assert_eq!(registry.for_session(session)[0].connection(), fresh);
        assert!(registry.rebind(a, ConnectionId::new()).is_none());
    }

    #[test]
    fn test_reset_answers() {
        let mut registry = ParticipantRegistry::new();
        let session = SessionId::new();
        let a = ConnectionId::new();
        registry.add(session, a, "A".into());
        let p = registry.get_mut(a).unwrap();
        p.last_answer = Some(3);
        p.bonus_pending = true;

        registry.reset_answers(session);
        let p = registry.get(a).unwrap();
        assert!(!p.has_answered());
        assert!(!p.bonus_pending);
    }

    #[test]
    fn test_award_never_decreases() {
        let mut registry = ParticipantRegistry::new();
        let a = ConnectionId::new();
        registry.add(SessionId::new(), a, "A".into());
        let p = registry.get_mut(a).unwrap();
        p.award(100);
        p.award(0);
        p.score = u64::MAX - 1;
        p.award(10);
        assert_eq!(p.score, u64::MAX);
    }
}
