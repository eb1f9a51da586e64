// src/services/results.rs

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, Ranking, UserAnswer},
        question::{AnswerOption, Question},
        test::{TestKind, TestRef},
    },
    services::scoring,
    store::ContentStore,
};

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOption {
    pub label: AnswerOption,
    pub text: String,
    pub is_correct: bool,
    pub is_selected: bool,
}

/// One question of a completed attempt, as shown in the review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub question_id: Uuid,
    pub question_text: String,
    pub options: Vec<ReviewOption>,
    pub correct_answer: AnswerOption,
    pub selected_answer: Option<AnswerOption>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

impl ReviewItem {
    fn compose(answer: &UserAnswer, question: &Question) -> Self {
        let options = AnswerOption::ALL
            .into_iter()
            .map(|label| ReviewOption {
                label,
                text: question.option_text(label).to_string(),
                is_correct: label == question.correct_answer,
                is_selected: answer.selected_answer == Some(label),
            })
            .collect();

        Self {
            question_id: question.id,
            question_text: question.question_text.clone(),
            options,
            correct_answer: question.correct_answer,
            selected_answer: answer.selected_answer,
            is_correct: answer.is_correct,
            explanation: question.explanation.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewCounts {
    pub correct: i32,
    pub incorrect: i32,
    pub unanswered: i32,
}

impl ReviewCounts {
    fn tally(items: &[ReviewItem]) -> Self {
        items.iter().fold(Self::default(), |mut counts, item| {
            match (item.selected_answer, item.is_correct) {
                (None, _) => counts.unanswered += 1,
                (Some(_), true) => counts.correct += 1,
                (Some(_), false) => counts.incorrect += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub attempt: Attempt,
    pub test_name: String,
    pub kind: TestKind,
    /// Correct over answered, as a rounded percentage.
    pub accuracy: i32,
    pub ranking: Ranking,
    pub counts: ReviewCounts,
    pub review: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub test_name: String,
    #[serde(flatten)]
    pub attempt: Attempt,
}

/// Loads a completed attempt of `user_id` with its full review. Read only.
pub async fn load_result(
    store: &dyn ContentStore,
    user_id: Uuid,
    attempt_id: Uuid,
) -> Result<ResultView, AppError> {
    let attempt = store
        .find_attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "Attempt belongs to another user".to_string(),
        ));
    }
    if !attempt.is_completed() {
        return Err(AppError::Conflict(
            "Attempt has not been submitted yet".to_string(),
        ));
    }

    let test_name = test_name(store, attempt.source).await?;

    let review: Vec<ReviewItem> = store
        .answers_with_questions(attempt.id)
        .await?
        .iter()
        .map(|(answer, question)| ReviewItem::compose(answer, question))
        .collect();

    let counts = ReviewCounts::tally(&review);
    if counts.correct != attempt.correct_answers || counts.incorrect != attempt.incorrect_answers {
        tracing::error!(
            attempt_id = %attempt.id,
            stored_correct = attempt.correct_answers,
            stored_incorrect = attempt.incorrect_answers,
            review_correct = counts.correct,
            review_incorrect = counts.incorrect,
            "Review counts do not match stored attempt"
        );
    }

    let ranking = store.ranking(attempt.source, attempt.score).await?;
    let accuracy = scoring::score_percent(
        attempt.correct_answers,
        attempt.correct_answers + attempt.incorrect_answers,
    );

    Ok(ResultView {
        kind: attempt.source.kind,
        attempt,
        test_name,
        accuracy,
        ranking,
        counts,
        review,
    })
}

/// Completed attempts of `user_id`, newest first, with their test names.
pub async fn list_history(
    store: &dyn ContentStore,
    user_id: Uuid,
) -> Result<Vec<HistoryEntry>, AppError> {
    let attempts = store.list_completed_attempts(user_id).await?;

    let mut names: HashMap<TestRef, String> = HashMap::new();
    let mut history = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let test_name = match names.get(&attempt.source) {
            Some(name) => name.clone(),
            None => {
                let name = test_name(store, attempt.source).await?;
                names.insert(attempt.source, name.clone());
                name
            }
        };
        history.push(HistoryEntry { test_name, attempt });
    }

    Ok(history)
}

async fn test_name(store: &dyn ContentStore, test: TestRef) -> Result<String, AppError> {
    Ok(store
        .find_test(test)
        .await?
        .map(|t| t.name)
        .unwrap_or_else(|| test.kind.fallback_name().to_string()))
}
