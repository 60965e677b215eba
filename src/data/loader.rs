use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{Quiz, QuizId, OPTION_COUNT};

/// Errors raised while loading the quiz catalog.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse quiz catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("quiz {id} has no questions")]
    NoQuestions { id: QuizId },

    #[error("quiz {id}, question {number}: correct option {correct} is not between 1 and {OPTION_COUNT}")]
    InvalidCorrect {
        id: QuizId,
        number: usize,
        correct: u8,
    },

    #[error("quiz id {id} appears more than once")]
    DuplicateId { id: QuizId },
}

/// Load the quiz catalog from a JSON file holding an array of quizzes.
pub fn load_quizzes_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<Quiz>, LoadError> {
    let path = path.as_ref();
    let json_content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_quizzes(&json_content)
}

/// Parse and validate a JSON quiz catalog.
pub fn parse_quizzes(json: &str) -> Result<Vec<Quiz>, LoadError> {
    let quizzes: Vec<Quiz> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for quiz in &quizzes {
        if !seen.insert(quiz.id) {
            return Err(LoadError::DuplicateId { id: quiz.id });
        }
        if quiz.questions.is_empty() {
            return Err(LoadError::NoQuestions { id: quiz.id });
        }
        for (i, question) in quiz.questions.iter().enumerate() {
            if !(1..=OPTION_COUNT as u8).contains(&question.correct) {
                return Err(LoadError::InvalidCorrect {
                    id: quiz.id,
                    number: i + 1,
                    correct: question.correct,
                });
            }
        }
    }

    Ok(quizzes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "id": 7,
            "name": "Rust",
            "questions": [
                {"question": "Borrow checker?", "answers": ["a", "b", "c", "d"], "correct": "2"},
                {"question": "Crab?", "answers": ["a", "b", "c", "d"], "correct": 1}
            ]
        },
        {
            "id": 8,
            "name": "Slides",
            "questions": [
                {"question": "Seen them?", "answers": ["y", "n", "?", "!"], "correct": 1}
            ],
            "slides": ["/uploads/1.png"]
        }
    ]"#;

    #[test]
    fn test_parse_catalog() {
        let quizzes = parse_quizzes(CATALOG).unwrap();
        assert_eq!(quizzes.len(), 2);
        assert_eq!(quizzes[0].questions[0].correct, 2);
        assert!(quizzes[0].slides.is_empty());
        assert_eq!(quizzes[1].slides, vec!["/uploads/1.png".to_string()]);
    }

    #[test]
    fn test_rejects_out_of_range_correct() {
        let json = r#"[{"id":1,"questions":[{"question":"?","answers":["a","b","c","d"],"correct":5}]}]"#;
        assert!(matches!(
            parse_quizzes(json),
            Err(LoadError::InvalidCorrect { correct: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicate() {
        let empty = r#"[{"id":1,"questions":[]}]"#;
        assert!(matches!(parse_quizzes(empty), Err(LoadError::NoQuestions { id: 1 })));

        let q = r#"{"question":"?","answers":["a","b","c","d"],"correct":1}"#;
        let dup = format!(r#"[{{"id":1,"questions":[{q}]}},{{"id":1,"questions":[{q}]}}]"#);
        assert!(matches!(parse_quizzes(&dup), Err(LoadError::DuplicateId { id: 1 })));
    }

    #[test]
    fn test_missing_file() {
        let err = load_quizzes_from_json("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
