//! Wire protocol between hosts, players and the server.

mod messages;

pub use messages::*;
