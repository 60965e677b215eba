mod loader;

pub use loader::{load_quizzes_from_json, parse_quizzes, LoadError};
