//! Session and participant registries.
//!
//! Both registries are plain owned values. The server keeps them together
//! behind one lock so that every transition (including a host migration)
//! is observed either completely or not at all.

mod ids;
mod participants;
mod registry;

pub use ids::{ConnectionId, Pin, SessionId, PIN_MAX, PIN_MIN};
pub use participants::{Participant, ParticipantRegistry};
pub use registry::{Phase, PinExhausted, RoundState, Session, SessionRegistry};
