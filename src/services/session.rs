// src/services/session.rs

//! In-progress test session: navigation, answer and mark bookkeeping, the
//! clock, and the state machine guarding finalization.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptOutcome},
        question::{AnswerOption, PublicQuestion, Question},
        test::{TestKind, TestSummary},
    },
    services::scoring::{self, Grade},
};

/// `InProgress -> Submitting -> Completed | SubmitFailed`, with
/// `SubmitFailed -> InProgress` on the next user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Submitting,
    Completed,
    SubmitFailed,
}

/// Palette status of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    NotAnswered,
    Answered,
    Marked,
    AnsweredMarked,
}

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    /// The clock just reached zero; the caller must finalize.
    Expired,
    /// The session is no longer accepting ticks.
    Stopped,
}

/// Everything a submission needs, captured when it begins.
#[derive(Debug, Clone)]
pub struct SubmissionDraft {
    pub grade: Grade,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub struct TestSession {
    attempt_id: Uuid,
    user_id: Uuid,
    test: TestSummary,
    questions: Vec<Question>,
    current_index: usize,
    answers: HashMap<Uuid, AnswerOption>,
    marked: HashSet<Uuid>,
    total_seconds: i64,
    remaining_seconds: i64,
    state: SessionState,
}

impl TestSession {
    /// Opens a session for a freshly created attempt. `questions` must not be empty.
    pub fn new(attempt: &Attempt, test: TestSummary, questions: Vec<Question>) -> Self {
        let total_seconds = test.duration_seconds();
        Self {
            attempt_id: attempt.id,
            user_id: attempt.user_id,
            test,
            questions,
            current_index: 0,
            answers: HashMap::new(),
            marked: HashSet::new(),
            total_seconds,
            remaining_seconds: total_seconds,
            state: SessionState::InProgress,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Accepts a user action, leaving `SubmitFailed` for `InProgress`.
    fn ensure_mutable(&mut self) -> Result<(), AppError> {
        match self.state {
            SessionState::InProgress => Ok(()),
            SessionState::SubmitFailed => {
                self.state = SessionState::InProgress;
                Ok(())
            }
            SessionState::Submitting => Err(AppError::Conflict(
                "Test is being submitted".to_string(),
            )),
            SessionState::Completed => Err(AppError::Conflict(
                "Test has already been submitted".to_string(),
            )),
        }
    }

    fn ensure_question(&self, question_id: Uuid) -> Result<(), AppError> {
        if self.questions.iter().any(|q| q.id == question_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("Question not found in this test".to_string()))
        }
    }

    pub fn select_answer(&mut self, question_id: Uuid, option: AnswerOption) -> Result<(), AppError> {
        self.ensure_question(question_id)?;
        self.ensure_mutable()?;
        self.answers.insert(question_id, option);
        Ok(())
    }

    pub fn clear_answer(&mut self, question_id: Uuid) -> Result<(), AppError> {
        self.ensure_question(question_id)?;
        self.ensure_mutable()?;
        self.answers.remove(&question_id);
        Ok(())
    }

    /// Flips the review mark and returns whether the question is now marked.
    pub fn toggle_mark(&mut self, question_id: Uuid) -> Result<bool, AppError> {
        self.ensure_question(question_id)?;
        self.ensure_mutable()?;
        if self.marked.remove(&question_id) {
            Ok(false)
        } else {
            self.marked.insert(question_id);
            Ok(true)
        }
    }

    /// Moves to `index`, clamped into the question range.
    pub fn navigate(&mut self, index: i64) -> Result<usize, AppError> {
        self.ensure_mutable()?;
        let last = self.questions.len().saturating_sub(1) as i64;
        self.current_index = index.clamp(0, last) as usize;
        Ok(self.current_index)
    }

    pub fn status(&self, question_id: Uuid) -> QuestionStatus {
        let answered = self.answers.contains_key(&question_id);
        let marked = self.marked.contains(&question_id);
        match (answered, marked) {
            (true, true) => QuestionStatus::AnsweredMarked,
            (true, false) => QuestionStatus::Answered,
            (false, true) => QuestionStatus::Marked,
            (false, false) => QuestionStatus::NotAnswered,
        }
    }

    /// Advances the clock by one second. A failed submission does not stop
    /// the clock.
    pub fn tick(&mut self) -> Tick {
        let open = matches!(
            self.state,
            SessionState::InProgress | SessionState::SubmitFailed
        );
        if !open || self.remaining_seconds <= 0 {
            return Tick::Stopped;
        }
        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            Tick::Expired
        } else {
            Tick::Running
        }
    }

    /// Single authoritative entry into finalization.
    ///
    /// Only one caller can move the session into `Submitting`; every later
    /// caller gets a `Conflict` until the attempt fails and is retried.
    pub fn begin_submit(&mut self) -> Result<SubmissionDraft, AppError> {
        match self.state {
            SessionState::InProgress | SessionState::SubmitFailed => {}
            SessionState::Submitting => {
                return Err(AppError::Conflict("Test is being submitted".to_string()));
            }
            SessionState::Completed => {
                return Err(AppError::Conflict(
                    "Attempt has already been submitted".to_string(),
                ));
            }
        }

        self.state = SessionState::Submitting;
        let grade = scoring::grade(&self.questions, &self.answers);
        let outcome = grade.outcome(self.total_seconds, self.remaining_seconds);
        Ok(SubmissionDraft { grade, outcome })
    }

    pub fn complete(&mut self) {
        self.state = SessionState::Completed;
    }

    /// Keeps all answers and marks so the user can retry.
    pub fn fail_submit(&mut self) {
        self.state = SessionState::SubmitFailed;
    }

    pub fn view(&self) -> SessionView {
        let palette: Vec<QuestionStatus> = self.questions.iter().map(|q| self.status(q.id)).collect();

        let mut counts = StatusCounts::default();
        for status in &palette {
            match status {
                QuestionStatus::NotAnswered => counts.not_answered += 1,
                QuestionStatus::Answered => counts.answered += 1,
                QuestionStatus::Marked => {
                    counts.not_answered += 1;
                    counts.marked += 1;
                }
                QuestionStatus::AnsweredMarked => {
                    counts.answered += 1;
                    counts.marked += 1;
                    counts.answered_and_marked += 1;
                }
            }
        }

        let current = self.questions.get(self.current_index).map(|q| CurrentQuestion {
            index: self.current_index,
            question: PublicQuestion::from(q),
            selected_answer: self.answers.get(&q.id).copied(),
            marked: self.marked.contains(&q.id),
        });

        SessionView {
            attempt_id: self.attempt_id,
            test_id: self.test.id,
            kind: self.test.kind,
            test_name: self.test.name.clone(),
            state: self.state,
            total_questions: self.questions.len(),
            current_index: self.current_index,
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            current,
            palette,
            counts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentQuestion {
    pub index: usize,
    pub question: PublicQuestion,
    pub selected_answer: Option<AnswerOption>,
    pub marked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub answered: usize,
    pub not_answered: usize,
    pub marked: usize,
    pub answered_and_marked: usize,
}

/// Snapshot of a session as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub kind: TestKind,
    pub test_name: String,
    pub state: SessionState,
    pub total_questions: usize,
    pub current_index: usize,
    pub total_seconds: i64,
    pub remaining_seconds: i64,
    pub current: Option<CurrentQuestion>,
    pub palette: Vec<QuestionStatus>,
    pub counts: StatusCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::TestRef;

    fn session(keys: &[AnswerOption], duration_minutes: i32) -> TestSession {
        let test = TestSummary {
            id: Uuid::new_v4(),
            kind: TestKind::Test,
            name: "General Studies".to_string(),
            subject: "GS".to_string(),
            exam_type: None,
            difficulty: None,
            year: None,
            questions_count: keys.len() as i32,
            duration_minutes,
            created_at: None,
        };
        let questions = keys
            .iter()
            .map(|key| Question {
                id: Uuid::new_v4(),
                owner: TestRef::test(test.id),
                question_text: "?".to_string(),
                option_a: "a".to_string(),
                option_b: "b".to_string(),
                option_c: "c".to_string(),
                option_d: "d".to_string(),
                correct_answer: *key,
                explanation: None,
                created_at: None,
            })
            .collect();
        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            source: test.test_ref(),
            total_questions: keys.len() as i32,
            score: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            time_taken_minutes: None,
            completed_at: None,
            created_at: None,
        };
        TestSession::new(&attempt, test, questions)
    }

    use AnswerOption::{A, B, C, D};

    #[test]
    fn test_new_session_starts_at_first_question_with_full_clock() {
        let s = session(&[A, B], 3);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.remaining_seconds(), 180);
        assert_eq!(s.state(), SessionState::InProgress);
    }

    #[test]
    fn test_toggle_mark_twice_restores_state() {
        let mut s = session(&[A], 1);
        let id = s.questions()[0].id;

        assert!(s.toggle_mark(id).unwrap());
        assert_eq!(s.status(id), QuestionStatus::Marked);
        assert!(!s.toggle_mark(id).unwrap());
        assert_eq!(s.status(id), QuestionStatus::NotAnswered);
    }

    #[test]
    fn test_four_state_status() {
        let mut s = session(&[A], 1);
        let id = s.questions()[0].id;

        s.select_answer(id, B).unwrap();
        assert_eq!(s.status(id), QuestionStatus::Answered);
        s.toggle_mark(id).unwrap();
        assert_eq!(s.status(id), QuestionStatus::AnsweredMarked);
        s.clear_answer(id).unwrap();
        assert_eq!(s.status(id), QuestionStatus::Marked);
    }

    #[test]
    fn test_select_answer_is_an_upsert() {
        let mut s = session(&[A], 1);
        let id = s.questions()[0].id;

        s.select_answer(id, B).unwrap();
        s.select_answer(id, A).unwrap();

        let draft = s.begin_submit().unwrap();
        assert_eq!(draft.grade.correct, 1);
    }

    #[test]
    fn test_unknown_question_is_not_found() {
        let mut s = session(&[A], 1);
        assert!(matches!(
            s.select_answer(Uuid::new_v4(), A),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_navigate_clamps_out_of_range() {
        let mut s = session(&[A, B, C], 1);
        assert_eq!(s.navigate(2).unwrap(), 2);
        assert_eq!(s.navigate(10).unwrap(), 2);
        assert_eq!(s.navigate(-4).unwrap(), 0);
    }

    #[test]
    fn test_tick_expires_exactly_once() {
        let mut s = session(&[A], 1);
        for _ in 0..59 {
            assert_eq!(s.tick(), Tick::Running);
        }
        assert_eq!(s.tick(), Tick::Expired);
        assert_eq!(s.remaining_seconds(), 0);
        assert_eq!(s.tick(), Tick::Stopped);
    }

    #[test]
    fn test_begin_submit_only_once() {
        let mut s = session(&[A, B, C], 1);
        let ids: Vec<Uuid> = s.questions().iter().map(|q| q.id).collect();
        s.select_answer(ids[0], A).unwrap();
        s.select_answer(ids[1], B).unwrap();
        s.select_answer(ids[2], D).unwrap();

        let draft = s.begin_submit().unwrap();
        assert_eq!(draft.outcome.score, 67);
        assert_eq!(draft.outcome.incorrect_answers, 1);

        assert!(matches!(s.begin_submit(), Err(AppError::Conflict(_))));
        assert_eq!(s.tick(), Tick::Stopped);
        assert!(matches!(s.select_answer(ids[0], B), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_failed_submit_keeps_answers_and_allows_retry() {
        let mut s = session(&[A, B], 1);
        let id = s.questions()[0].id;
        s.select_answer(id, A).unwrap();

        s.begin_submit().unwrap();
        s.fail_submit();
        assert_eq!(s.state(), SessionState::SubmitFailed);

        s.toggle_mark(id).unwrap();
        assert_eq!(s.state(), SessionState::InProgress);
        assert_eq!(s.status(id), QuestionStatus::AnsweredMarked);

        let retry = s.begin_submit().unwrap();
        assert_eq!(retry.grade.correct, 1);
        s.complete();
        assert_eq!(s.state(), SessionState::Completed);
    }

    #[test]
    fn test_clock_runs_on_after_failed_submit() {
        let mut s = session(&[A], 1);
        s.begin_submit().unwrap();
        assert_eq!(s.tick(), Tick::Stopped);

        s.fail_submit();
        for _ in 0..59 {
            assert_eq!(s.tick(), Tick::Running);
        }
        assert_eq!(s.tick(), Tick::Expired);
        assert_eq!(s.state(), SessionState::SubmitFailed);

        // Expiry from the failed state still gets exactly one finalization.
        assert!(s.begin_submit().is_ok());
        assert!(matches!(s.begin_submit(), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_view_counts() {
        let mut s = session(&[A, B, C, D], 1);
        let ids: Vec<Uuid> = s.questions().iter().map(|q| q.id).collect();
        s.select_answer(ids[0], A).unwrap();
        s.select_answer(ids[1], A).unwrap();
        s.toggle_mark(ids[1]).unwrap();
        s.toggle_mark(ids[2]).unwrap();

        let view = s.view();
        assert_eq!(
            view.counts,
            StatusCounts {
                answered: 2,
                not_answered: 2,
                marked: 2,
                answered_and_marked: 1,
            }
        );
        assert_eq!(view.palette[3], QuestionStatus::NotAnswered);
        assert_eq!(view.current.map(|c| c.index), Some(0));
    }
}
