// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    models::{
        article::{Article, NewArticle},
        attempt::{Attempt, AttemptOutcome, NewAttempt, NewUserAnswer, Ranking, UserAnswer},
        exam_category::ExamCategory,
        question::{AnswerOption, NewQuestion, Question},
        setting::AdminSetting,
        test::{NewMockTest, TestKind, TestRef, TestSummary},
    },
    store::{ContentStore, StoreError},
};

type Timestamp = chrono::DateTime<chrono::Utc>;

/// Postgres-backed content store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper struct for the unified test/paper projection.
#[derive(FromRow)]
struct TestRow {
    id: Uuid,
    name: String,
    subject: String,
    exam_type: Option<String>,
    difficulty: Option<String>,
    year: Option<i32>,
    questions_count: i32,
    duration_minutes: i32,
    created_at: Option<Timestamp>,
}

impl TestRow {
    fn into_summary(self, kind: TestKind) -> TestSummary {
        TestSummary {
            id: self.id,
            kind,
            name: self.name,
            subject: self.subject,
            exam_type: self.exam_type,
            difficulty: self.difficulty,
            year: self.year,
            questions_count: self.questions_count,
            duration_minutes: self.duration_minutes,
            created_at: self.created_at,
        }
    }
}

const MOCK_TEST_COLUMNS: &str = "id, title AS name, subject, exam_type, difficulty, \
     NULL::INT AS year, questions_count, duration_minutes, created_at";

const PAPER_COLUMNS: &str = "id, paper_name AS name, exam_type AS subject, exam_type, difficulty, \
     year, questions_count, duration_minutes, created_at";

fn test_select(kind: TestKind) -> String {
    match kind {
        TestKind::Test => format!("SELECT {MOCK_TEST_COLUMNS} FROM mock_tests"),
        TestKind::Paper => format!("SELECT {PAPER_COLUMNS} FROM previous_papers"),
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    test_id: Option<Uuid>,
    paper_id: Option<Uuid>,
    question_text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
    explanation: Option<String>,
    created_at: Option<Timestamp>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let owner = TestRef::from_columns(row.test_id, row.paper_id).ok_or_else(|| {
            StoreError::InvalidRow(format!("question {} must have exactly one owner", row.id))
        })?;
        let correct_answer = row
            .correct_answer
            .parse::<AnswerOption>()
            .map_err(|e| StoreError::InvalidRow(format!("question {}: {e}", row.id)))?;

        Ok(Question {
            id: row.id,
            owner,
            question_text: row.question_text,
            option_a: row.option_a,
            option_b: row.option_b,
            option_c: row.option_c,
            option_d: row.option_d,
            correct_answer,
            explanation: row.explanation,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    user_id: Uuid,
    test_id: Option<Uuid>,
    paper_id: Option<Uuid>,
    total_questions: i32,
    score: i32,
    correct_answers: i32,
    incorrect_answers: i32,
    time_taken_minutes: Option<i32>,
    completed_at: Option<Timestamp>,
    created_at: Option<Timestamp>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let source = TestRef::from_columns(row.test_id, row.paper_id).ok_or_else(|| {
            StoreError::InvalidRow(format!("attempt {} must have exactly one source", row.id))
        })?;

        Ok(Attempt {
            id: row.id,
            user_id: row.user_id,
            source,
            total_questions: row.total_questions,
            score: row.score,
            correct_answers: row.correct_answers,
            incorrect_answers: row.incorrect_answers,
            time_taken_minutes: row.time_taken_minutes,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

const ATTEMPT_COLUMNS: &str = "id, user_id, test_id, paper_id, total_questions, score, \
     correct_answers, incorrect_answers, time_taken_minutes, completed_at, created_at";

/// Helper struct for the answer/question join of the review.
#[derive(FromRow)]
struct AnswerJoinRow {
    answer_id: Uuid,
    attempt_id: Uuid,
    selected_answer: Option<String>,
    is_correct: bool,
    is_bookmarked: bool,
    #[sqlx(flatten)]
    question: QuestionRow,
}

#[derive(FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    content: Option<String>,
    category: String,
    language: Option<String>,
    source: Option<String>,
    published_date: chrono::NaiveDate,
    image_url: Option<String>,
    created_at: Option<Timestamp>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            description: row.description,
            content: row.content,
            category: row.category,
            language: row.language,
            source: row.source,
            published_date: row.published_date,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn list_exam_categories(&self) -> Result<Vec<ExamCategory>, StoreError> {
        let categories = sqlx::query_as::<_, ExamCategory>(
            "SELECT id, name, description, created_at FROM exam_categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn list_tests(&self, kind: TestKind) -> Result<Vec<TestSummary>, StoreError> {
        let sql = format!("{} ORDER BY created_at DESC", test_select(kind));
        let rows = sqlx::query_as::<_, TestRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_summary(kind)).collect())
    }

    async fn find_test(&self, test: TestRef) -> Result<Option<TestSummary>, StoreError> {
        let sql = format!("{} WHERE id = $1", test_select(test.kind));
        let row = sqlx::query_as::<_, TestRow>(&sql)
            .bind(test.id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_summary(test.kind)))
    }

    async fn questions_for(&self, test: TestRef) -> Result<Vec<Question>, StoreError> {
        let column = match test.kind {
            TestKind::Test => "test_id",
            TestKind::Paper => "paper_id",
        };
        let sql = format!(
            "SELECT id, test_id, paper_id, question_text, option_a, option_b, option_c, option_d,
                    correct_answer, explanation, created_at
             FROM questions
             WHERE {column} = $1
             ORDER BY seq"
        );

        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(test.id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn create_test_with_questions(
        &self,
        test: NewMockTest,
        questions: &[NewQuestion],
    ) -> Result<TestSummary, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TestRow>(&format!(
            "INSERT INTO mock_tests (title, subject, difficulty, exam_type, questions_count, duration_minutes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MOCK_TEST_COLUMNS}"
        ))
        .bind(&test.title)
        .bind(&test.subject)
        .bind(&test.difficulty)
        .bind(&test.exam_type)
        .bind(questions.len() as i32)
        .bind(test.duration_minutes)
        .fetch_one(&mut *tx)
        .await?;

        if !questions.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO questions
                 (test_id, question_text, option_a, option_b, option_c, option_d, correct_answer, explanation) ",
            );
            builder.push_values(questions, |mut b, q| {
                b.push_bind(row.id)
                    .push_bind(&q.question_text)
                    .push_bind(&q.option_a)
                    .push_bind(&q.option_b)
                    .push_bind(&q.option_c)
                    .push_bind(&q.option_d)
                    .push_bind(q.correct_answer.as_str())
                    .push_bind(&q.explanation);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(row.into_summary(TestKind::Test))
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<Attempt, StoreError> {
        let (test_id, paper_id) = attempt.source.to_columns();

        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "INSERT INTO test_attempts
             (user_id, test_id, paper_id, total_questions, score, correct_answers, incorrect_answers)
             VALUES ($1, $2, $3, $4, 0, 0, 0)
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(attempt.user_id)
        .bind(test_id)
        .bind(paper_id)
        .bind(attempt.total_questions)
        .fetch_one(&self.pool)
        .await?;

        Attempt::try_from(row)
    }

    async fn find_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM test_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn list_completed_attempts(&self, user_id: Uuid) -> Result<Vec<Attempt>, StoreError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM test_attempts
             WHERE user_id = $1 AND completed_at IS NOT NULL
             ORDER BY completed_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn record_submission(
        &self,
        attempt_id: Uuid,
        outcome: AttemptOutcome,
        answers: &[NewUserAnswer],
    ) -> Result<Attempt, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Finalize first: the conditional update both claims the attempt and
        // locks its row for the rest of the transaction.
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "UPDATE test_attempts
             SET score = $2, correct_answers = $3, incorrect_answers = $4,
                 time_taken_minutes = $5, completed_at = NOW()
             WHERE id = $1 AND completed_at IS NULL
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(attempt_id)
        .bind(outcome.score)
        .bind(outcome.correct_answers)
        .bind(outcome.incorrect_answers)
        .bind(outcome.time_taken_minutes)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM test_attempts WHERE id = $1")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::AlreadyCompleted,
                None => StoreError::NotFound("Attempt"),
            });
        };

        if !answers.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO user_answers (attempt_id, question_id, selected_answer, is_correct) ",
            );
            builder.push_values(answers, |mut b, a| {
                b.push_bind(attempt_id)
                    .push_bind(a.question_id)
                    .push_bind(a.selected_answer.map(AnswerOption::as_str))
                    .push_bind(a.is_correct);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Attempt::try_from(row)
    }

    async fn answers_with_questions(
        &self,
        attempt_id: Uuid,
    ) -> Result<Vec<(UserAnswer, Question)>, StoreError> {
        let rows = sqlx::query_as::<_, AnswerJoinRow>(
            "SELECT
                ua.id AS answer_id, ua.attempt_id, ua.selected_answer, ua.is_correct, ua.is_bookmarked,
                q.id, q.test_id, q.paper_id, q.question_text, q.option_a, q.option_b, q.option_c,
                q.option_d, q.correct_answer, q.explanation, q.created_at
             FROM user_answers ua
             JOIN questions q ON q.id = ua.question_id
             WHERE ua.attempt_id = $1
             ORDER BY q.seq",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let selected_answer = row
                    .selected_answer
                    .as_deref()
                    .map(str::parse::<AnswerOption>)
                    .transpose()
                    .map_err(StoreError::InvalidRow)?;
                let question = Question::try_from(row.question)?;
                let answer = UserAnswer {
                    id: row.answer_id,
                    attempt_id: row.attempt_id,
                    question_id: question.id,
                    selected_answer,
                    is_correct: row.is_correct,
                    is_bookmarked: row.is_bookmarked,
                };
                Ok((answer, question))
            })
            .collect()
    }

    async fn ranking(&self, test: TestRef, score: i32) -> Result<Ranking, StoreError> {
        let column = match test.kind {
            TestKind::Test => "test_id",
            TestKind::Paper => "paper_id",
        };

        let (higher, participants) = sqlx::query_as::<_, (i64, i64)>(&format!(
            "SELECT
                COUNT(*) FILTER (WHERE score > $2),
                COUNT(*)
             FROM test_attempts
             WHERE {column} = $1 AND completed_at IS NOT NULL"
        ))
        .bind(test.id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(Ranking {
            position: higher + 1,
            participants,
        })
    }

    async fn get_setting(&self, key: &str) -> Result<Option<AdminSetting>, StoreError> {
        let setting = sqlx::query_as::<_, AdminSetting>(
            "SELECT key, value, updated_by, updated_at FROM admin_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    async fn list_settings(&self) -> Result<Vec<AdminSetting>, StoreError> {
        let settings = sqlx::query_as::<_, AdminSetting>(
            "SELECT key, value, updated_by, updated_at FROM admin_settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn put_setting(
        &self,
        key: &str,
        value: &str,
        updated_by: Uuid,
    ) -> Result<AdminSetting, StoreError> {
        let setting = sqlx::query_as::<_, AdminSetting>(
            r#"
            INSERT INTO admin_settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING key, value, updated_by, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(setting)
    }

    async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64, StoreError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO articles
             (title, title_key, description, content, category, language, source, published_date, image_url) ",
        );
        builder.push_values(articles, |mut b, a| {
            b.push_bind(&a.title)
                .push_bind(&a.title_key)
                .push_bind(&a.description)
                .push_bind(&a.content)
                .push_bind(&a.category)
                .push_bind(&a.language)
                .push_bind(&a.source)
                .push_bind(a.published_date)
                .push_bind(&a.image_url);
        });
        builder.push(" ON CONFLICT (title_key) DO NOTHING");

        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn list_articles(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, title, description, content, category, language, source,
                    published_date, image_url, created_at
             FROM articles",
        );
        if let Some(language) = language {
            builder.push(" WHERE language = ");
            builder.push_bind(language);
        }
        builder.push(" ORDER BY published_date DESC, created_at DESC LIMIT ");
        builder.push_bind(limit);

        let rows: Vec<ArticleRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }
}
