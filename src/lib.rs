//! # quiz-arena
//!
//! A live multiplayer quiz server. One host connection drives a shared
//! presentation while any number of players answer over WebSocket; answers
//! are tallied and scored as they arrive.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quiz_arena::{server, QuizError, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QuizError> {
//!     // Serve the quizzes in quizzes.json on the default port
//!     server::run(ServerConfig::new("quizzes.json")).await
//! }
//! ```

pub mod completion;
pub mod config;
pub mod data;
pub mod models;
pub mod protocol;
pub mod repository;
pub mod server;
pub mod session;

use std::io;

use thiserror::Error;

pub use config::{BonusTiming, RoundSettings, ServerConfig};
pub use data::{load_quizzes_from_json, LoadError};
pub use models::{Question, Quiz, QuizId, QuizSummary};
pub use server::Coordinator;

/// Error type for running the server.
#[derive(Debug, Error)]
pub enum QuizError {
    /// Error loading the quiz catalog.
    #[error("Failed to load quizzes: {0}")]
    Load(#[from] LoadError),

    /// IO error while binding or serving.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
