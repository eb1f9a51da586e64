// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{question::AnswerOption, test::TestRef};

/// Represents the 'test_attempts' table in the database.
/// One user's timed run through a mock test or previous paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: TestRef,

    /// Fixed at creation to the question count of the test.
    pub total_questions: i32,

    /// Percentage 0-100, zero until the attempt is finalized.
    pub score: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,

    pub time_taken_minutes: Option<i32>,

    /// `None` while the attempt is in progress.
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Insert payload for an attempt opened at test start.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub source: TestRef,
    pub total_questions: i32,
}

/// Final statistics written exactly once at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub score: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub time_taken_minutes: i32,
}

/// Represents the 'user_answers' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    /// `None` for an unanswered question.
    pub selected_answer: Option<AnswerOption>,
    pub is_correct: bool,
    pub is_bookmarked: bool,
}

/// Insert payload for one graded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserAnswer {
    pub question_id: Uuid,
    pub selected_answer: Option<AnswerOption>,
    pub is_correct: bool,
}

/// Position of a completed attempt among all completed attempts of the same test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// 1 + attempts with a strictly higher score.
    pub position: i64,
    pub participants: i64,
}
