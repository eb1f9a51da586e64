// src/services/scoring.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    attempt::{AttemptOutcome, NewUserAnswer},
    question::{AnswerOption, Question},
};

/// Result of grading a full question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    /// One entry per question, in question order, unanswered ones included.
    pub answers: Vec<NewUserAnswer>,
    pub correct: i32,
    pub incorrect: i32,
    pub total: i32,
}

/// Grades every question of the set against the selections.
///
/// Unanswered questions produce `selected_answer = None, is_correct = false`
/// and count toward neither total. Selections for ids outside the set are ignored.
pub fn grade(questions: &[Question], selections: &HashMap<Uuid, AnswerOption>) -> Grade {
    let mut correct = 0;
    let mut incorrect = 0;

    let answers = questions
        .iter()
        .map(|q| {
            let selected_answer = selections.get(&q.id).copied();
            let is_correct = selected_answer == Some(q.correct_answer);
            match selected_answer {
                Some(_) if is_correct => correct += 1,
                Some(_) => incorrect += 1,
                None => {}
            }
            NewUserAnswer {
                question_id: q.id,
                selected_answer,
                is_correct,
            }
        })
        .collect();

    Grade {
        answers,
        correct,
        incorrect,
        total: questions.len() as i32,
    }
}

/// `round(correct / total * 100)`, halves rounded up. Zero for an empty set.
pub fn score_percent(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let (correct, total) = (i64::from(correct.max(0)), i64::from(total));
    ((correct * 200 + total) / (total * 2)) as i32
}

/// Whole minutes elapsed on the clock, rounded down.
pub fn time_taken_minutes(total_seconds: i64, remaining_seconds: i64) -> i32 {
    let elapsed = (total_seconds - remaining_seconds.max(0)).max(0);
    (elapsed / 60) as i32
}

impl Grade {
    pub fn outcome(&self, total_seconds: i64, remaining_seconds: i64) -> AttemptOutcome {
        AttemptOutcome {
            score: score_percent(self.correct, self.total),
            correct_answers: self.correct,
            incorrect_answers: self.incorrect,
            time_taken_minutes: time_taken_minutes(total_seconds, remaining_seconds),
        }
    }
}
