use serde::{Deserialize, Serialize};

use super::Question;

/// Identifier of a quiz in the repository.
pub type QuizId = u32;

/// A complete quiz: ordered questions plus optional presentation slides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    #[serde(default)]
    pub name: String,
    pub questions: Vec<Question>,
    /// Slide image locations, already normalised to URLs by the repository.
    #[serde(default)]
    pub slides: Vec<String>,
}

impl Quiz {
    /// Look up a question by its 1-based number.
    pub fn question(&self, number: usize) -> Option<&Question> {
        number.checked_sub(1).and_then(|i| self.questions.get(i))
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn has_slides(&self) -> bool {
        !self.slides.is_empty()
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            name: self.name.clone(),
            question_count: self.questions.len(),
            slide_count: self.slides.len(),
        }
    }
}

/// Catalog entry sent to hosts choosing a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub name: String,
    pub question_count: usize,
    pub slide_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz() -> Quiz {
        let q = |text: &str| Question {
            text: text.to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct: 1,
        };
        Quiz {
            id: 3,
            name: "Basics".to_string(),
            questions: vec![q("first"), q("second")],
            slides: Vec::new(),
        }
    }

    #[test]
    fn test_question_numbers_are_one_based() {
        let quiz = quiz();
        assert!(quiz.question(0).is_none());
        assert_eq!(quiz.question(1).unwrap().text, "first");
        assert_eq!(quiz.question(2).unwrap().text, "second");
        assert!(quiz.question(3).is_none());
    }

    #[test]
    fn test_summary() {
        let summary = quiz().summary();
        assert_eq!(summary.question_count, 2);
        assert_eq!(summary.slide_count, 0);
        assert_eq!(summary.name, "Basics");
    }
}
