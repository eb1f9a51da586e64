// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::test::TestRef;

/// One of the four option labels of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 4] = [Self::A, Self::B, Self::C, Self::D];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            other => Err(format!("'{other}' is not one of a, b, c, d")),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,

    /// Owning mock test or previous paper.
    pub owner: TestRef,

    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    pub correct_answer: AnswerOption,

    /// Explanation of the correct answer, shown in the review.
    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn option_text(&self, option: AnswerOption) -> &str {
        match option {
            AnswerOption::A => &self.option_a,
            AnswerOption::B => &self.option_b,
            AnswerOption::C => &self.option_c,
            AnswerOption::D => &self.option_d,
        }
    }
}

/// A labelled option as sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledOption {
    pub label: AnswerOption,
    pub text: String,
}

/// DTO for sending a question during a session (excludes answer and explanation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub options: Vec<LabelledOption>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text.clone(),
            options: AnswerOption::ALL
                .into_iter()
                .map(|label| LabelledOption {
                    label,
                    text: q.option_text(label).to_string(),
                })
                .collect(),
        }
    }
}

/// Insert payload for a question; the owner is supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: AnswerOption,
    pub explanation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_option_parsing_is_lenient_on_case_and_whitespace() {
        assert_eq!(" B ".parse::<AnswerOption>(), Ok(AnswerOption::B));
        assert_eq!("d".parse::<AnswerOption>(), Ok(AnswerOption::D));
        assert!("e".parse::<AnswerOption>().is_err());
        assert!("".parse::<AnswerOption>().is_err());
    }

    #[test]
    fn test_public_question_hides_answer_and_labels_options() {
        let q = Question {
            id: Uuid::new_v4(),
            owner: TestRef::test(Uuid::new_v4()),
            question_text: "Capital of India?".to_string(),
            option_a: "Mumbai".to_string(),
            option_b: "New Delhi".to_string(),
            option_c: "Kolkata".to_string(),
            option_d: "Chennai".to_string(),
            correct_answer: AnswerOption::B,
            explanation: Some("Seat of government".to_string()),
            created_at: None,
        };

        let public = PublicQuestion::from(&q);
        let json = serde_json::to_value(&public).unwrap();

        assert!(json.get("correct_answer").is_none());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["options"][1]["label"], "b");
        assert_eq!(json["options"][1]["text"], "New Delhi");
    }
}
