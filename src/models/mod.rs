//! Quiz content types shared by the repository, the coordinator and the wire protocol.

mod question;
mod quiz;

pub use question::{Question, OPTION_COUNT};
pub use quiz::{Quiz, QuizId, QuizSummary};
