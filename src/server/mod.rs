//! Quiz server module.
//!
//! Provides WebSocket-based multiplayer quiz hosting: one host connection
//! per session drives the rounds, any number of players answer.

mod coordinator;
mod hub;
pub mod scoring;
mod server;
mod state;


pub use coordinator::{Coordinator, HandleError, SharedState};
pub use hub::{Hub, Outbox};
pub use server::{run, serve};
pub use state::ServerState;
