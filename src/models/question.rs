use serde::{Deserialize, Deserializer, Serialize};

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// A single multiple-choice question.
///
/// Field names on disk follow the quiz creator's format (`question`,
/// `answers`, `correct`). The correct option is 1-based and may be stored
/// either as a number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    #[serde(rename = "answers")]
    pub options: [String; OPTION_COUNT],
    #[serde(deserialize_with = "option_number")]
    pub correct: u8,
}

impl Question {
    /// Whether `option` (1-based) is the correct one.
    pub fn is_correct(&self, option: u8) -> bool {
        option == self.correct
    }
}

fn option_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_accepts_number_or_string() {
        let json = r#"{"question":"2+2?","answers":["1","2","3","4"],"correct":4}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct, 4);

        let json = r#"{"question":"2+2?","answers":["1","2","3","4"],"correct":" 4"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert!(q.is_correct(4));
        assert!(!q.is_correct(1));
    }

    #[test]
    fn test_rejects_wrong_option_count() {
        let json = r#"{"question":"?","answers":["a","b","c"],"correct":1}"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }
}
