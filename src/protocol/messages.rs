//! Protocol messages for client-server communication.
//!
//! All messages are serialized as JSON over WebSocket, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::models::{QuizId, QuizSummary, OPTION_COUNT};
use crate::session::{ConnectionId, Pin};

/// Number of name slots in the game-over ranking.
pub const RANKING_SLOTS: usize = 5;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Host opens a new session for a quiz.
    CreateSession { quiz_id: QuizId },

    /// Host reconnects into the game view, presenting its previous id.
    ResumeSession { previous_host_id: ConnectionId },

    /// Host closes the lobby.
    StartGame,

    /// Host moves on to the next question (or to the final ranking).
    AdvanceQuestion,

    /// Host's question timer ran out. `question` pins the timeout to a
    /// specific question number so a late timer cannot close a later round.
    TimeUp {
        #[serde(default)]
        question: Option<usize>,
    },

    /// Host asks for the list of playable quizzes.
    RequestQuizCatalog,

    /// Player joins a session's lobby by pin.
    JoinLobby { pin: Pin, name: String },

    /// Player reconnects into the game view, presenting its previous id.
    JoinGame { previous_connection_id: ConnectionId },

    /// Player answers the live question with option 1..=4.
    SubmitAnswer { option: u8 },

    /// Reply to [`ServerMessage::TimeBonusRequest`].
    ReportElapsedTime {
        connection_id: ConnectionId,
        remaining_seconds: f64,
    },

    /// Player asks for its current score.
    RequestScore,

    /// Chat line for everyone in the session.
    SendChat { text: String },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Connection accepted. Keep the id to resume after a reconnect.
    ConnectionAck { connection_id: ConnectionId },

    /// Unknown pin, quiz, session or participant.
    NoGameFound,

    /// Session created, players join with this pin.
    PinAssigned { pin: Pin },

    /// Display name rejected.
    JoinRejected { reason: String },

    /// Current lobby membership, in join order.
    RosterUpdated { players: Vec<PlayerEntry> },

    /// Sent to a player that resumed into the game view.
    PlayerGameData { players: Vec<PlayerEntry> },

    /// The quiz opens with a slide presentation.
    PresentationSlides { urls: Vec<String> },

    /// A question is now live.
    QuestionPayload {
        number: usize,
        total: usize,
        text: String,
        options: [String; OPTION_COUNT],
        participant_count: usize,
    },

    /// Answers received so far for the live question.
    LiveTally { answered: usize, total: usize },

    /// Sent to the submitter of an answer.
    AnswerResult { correct: bool },

    /// Ask the group's timekeeper how much time the given player had left.
    TimeBonusRequest { connection_id: ConnectionId },

    /// The question closed. Emitted once per question.
    RoundClosed {
        number: usize,
        votes: [usize; OPTION_COUNT],
        percentages: [u32; OPTION_COUNT],
        correct_option: u8,
        answered: usize,
        total: usize,
    },

    /// Final ranking, best first, padded with empty names.
    GameOver { top: [String; RANKING_SLOTS] },

    /// Lobby closed. The handle is the host's connection id to resume with.
    GameStarted { handle: ConnectionId },

    /// The host disconnected. When `session_closed` is false the host may
    /// still resume.
    HostLeft { session_closed: bool },

    ChatMessage { sender: String, text: String },

    ScoreUpdate { score: u64 },

    QuizCatalog { quizzes: Vec<QuizSummary> },
}

/// Entry in a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub name: String,
    pub score: u64,
}

/// Display name validation constants.
pub const NAME_MIN_LENGTH: usize = 1;
pub const NAME_MAX_LENGTH: usize = 24;

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Validates a display name. Names need not be unique.
///
/// Returns `Ok(())` if valid, or `Err` with an error message.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let length = name.trim().chars().count();

    if length < NAME_MIN_LENGTH {
        return Err("Name must not be empty");
    }

    if length > NAME_MAX_LENGTH {
        return Err("Name must be at most 24 characters");
    }

    Ok(())
}
