//! Runtime configuration assembled by the binary from CLI flags and env.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::completion::CompletionConfig;
use crate::protocol::DEFAULT_PORT;

/// How the time bonus for a correct answer is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BonusTiming {
    /// From the round's start and the answer's arrival, on the server.
    #[default]
    Server,
    /// From a remaining-time report sent back by the session's timekeeper.
    ClientReported,
}

/// Round timing and scoring settings.
#[derive(Debug, Clone)]
pub struct RoundSettings {
    /// How long each question stays open.
    pub question_time: Duration,
    pub bonus_timing: BonusTiming,
    /// Also close rounds from a server-side timer.
    pub auto_close: bool,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            question_time: Duration::from_secs(20),
            bonus_timing: BonusTiming::Server,
            auto_close: false,
        }
    }
}

/// Everything needed to start the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JSON file holding the quiz catalog.
    pub quizzes_path: PathBuf,
    pub round: RoundSettings,
    /// `None` disables `GPT:` chat commands.
    pub completion: Option<CompletionConfig>,
}

impl ServerConfig {
    pub fn new(quizzes_path: impl Into<PathBuf>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            quizzes_path: quizzes_path.into(),
            round: RoundSettings::default(),
            completion: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
