//! Outbound side of every connection: per-connection channels and session groups.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::session::{ConnectionId, SessionId};

/// Channel feeding one connection's writer task.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Default)]
pub struct Hub {
    connections: HashMap<ConnectionId, Outbox>,
    groups: HashMap<SessionId, Vec<ConnectionId>>,
    membership: HashMap<ConnectionId, SessionId>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, outbox: Outbox) {
        self.connections.insert(id, outbox);
    }

    /// Forget a connection and take it out of its group.
    pub fn unregister(&mut self, id: ConnectionId) {
        self.leave(id);
        self.connections.remove(&id);
    }

    #[cfg(test)]
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Put a connection in a session's group, leaving any previous one.
    pub fn join(&mut self, session: SessionId, id: ConnectionId) {
        if self.membership.get(&id) == Some(&session) {
            return;
        }
        self.leave(id);
        self.groups.entry(session).or_default().push(id);
        self.membership.insert(id, session);
    }

    pub fn leave(&mut self, id: ConnectionId) -> Option<SessionId> {
        let session = self.membership.remove(&id)?;
        if let Some(members) = self.groups.get_mut(&session) {
            members.retain(|m| *m != id);
            if members.is_empty() {
                self.groups.remove(&session);
            }
        }
        Some(session)
    }

    /// Drop a session's group. Its connections stay registered.
    pub fn dissolve(&mut self, session: SessionId) {
        for id in self.groups.remove(&session).unwrap_or_default() {
            self.membership.remove(&id);
        }
    }

    #[cfg(test)]
    pub fn group_size(&self, session: SessionId) -> usize {
        self.groups.get(&session).map_or(0, Vec::len)
    }

    /// Send to one connection. Returns false if it is gone.
    pub fn send(&self, id: ConnectionId, msg: ServerMessage) -> bool {
        match self.connections.get(&id) {
            Some(outbox) => outbox.send(msg).is_ok(),
            None => false,
        }
    }

    /// Send to every connection in a session's group. Returns how many
    /// connections accepted the message.
    pub fn broadcast(&self, session: SessionId, msg: ServerMessage) -> usize {
        let Some(members) = self.groups.get(&session) else {
            return 0;
        };
        members
            .iter()
            .filter(|id| self.send(**id, msg.clone()))
            .count()
    }
}
