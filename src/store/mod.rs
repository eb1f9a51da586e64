// src/store/mod.rs

//! Content store: persistent storage for tests, papers, questions, attempts,
//! answers, articles and admin settings.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    article::{Article, NewArticle},
    attempt::{Attempt, AttemptOutcome, NewAttempt, NewUserAnswer, Ranking, UserAnswer},
    exam_category::ExamCategory,
    question::{NewQuestion, Question},
    setting::AdminSetting,
    test::{NewMockTest, TestKind, TestRef, TestSummary},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The attempt was finalized before; nothing was written.
    #[error("attempt already completed")]
    AlreadyCompleted,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A stored row violates a model invariant (bad option label, two owners...).
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_exam_categories(&self) -> Result<Vec<ExamCategory>, StoreError>;

    async fn list_tests(&self, kind: TestKind) -> Result<Vec<TestSummary>, StoreError>;

    async fn find_test(&self, test: TestRef) -> Result<Option<TestSummary>, StoreError>;

    async fn questions_for(&self, test: TestRef) -> Result<Vec<Question>, StoreError>;

    /// Creates a mock test and its questions as one unit.
    /// `questions_count` and `duration_minutes` are taken from the arguments as given.
    async fn create_test_with_questions(
        &self,
        test: NewMockTest,
        questions: &[NewQuestion],
    ) -> Result<TestSummary, StoreError>;

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<Attempt, StoreError>;

    async fn find_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError>;

    /// Completed attempts of a user, newest first.
    async fn list_completed_attempts(&self, user_id: Uuid) -> Result<Vec<Attempt>, StoreError>;

    /// Inserts all answers and finalizes the attempt as one unit.
    ///
    /// Finalization only applies to an attempt whose `completed_at` is still
    /// null; otherwise `StoreError::AlreadyCompleted` is returned and nothing
    /// is written.
    async fn record_submission(
        &self,
        attempt_id: Uuid,
        outcome: AttemptOutcome,
        answers: &[NewUserAnswer],
    ) -> Result<Attempt, StoreError>;

    /// Answers of an attempt joined with their questions, in question order.
    async fn answers_with_questions(
        &self,
        attempt_id: Uuid,
    ) -> Result<Vec<(UserAnswer, Question)>, StoreError>;

    async fn ranking(&self, test: TestRef, score: i32) -> Result<Ranking, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<AdminSetting>, StoreError>;

    async fn list_settings(&self) -> Result<Vec<AdminSetting>, StoreError>;

    async fn put_setting(
        &self,
        key: &str,
        value: &str,
        updated_by: Uuid,
    ) -> Result<AdminSetting, StoreError>;

    /// Inserts articles, silently skipping any whose `title_key` already exists.
    /// Returns the number of rows actually inserted.
    async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64, StoreError>;

    async fn list_articles(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError>;
}
