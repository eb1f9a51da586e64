// src/store/memory.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        article::{Article, NewArticle},
        attempt::{Attempt, AttemptOutcome, NewAttempt, NewUserAnswer, Ranking, UserAnswer},
        exam_category::ExamCategory,
        question::{NewQuestion, Question},
        setting::AdminSetting,
        test::{NewMockTest, TestKind, TestRef, TestSummary},
    },
    store::{ContentStore, StoreError},
};

#[derive(Default)]
struct Inner {
    categories: Vec<ExamCategory>,
    tests: Vec<TestSummary>,
    questions: Vec<Question>,
    attempts: HashMap<Uuid, Attempt>,
    answers: Vec<UserAnswer>,
    settings: BTreeMap<String, AdminSetting>,
    articles: Vec<Article>,
    article_keys: HashSet<String>,
}

/// In-process content store.
///
/// Used when no `DATABASE_URL` is configured and by the test suite. Every
/// operation runs under one lock, so multi-step writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_exam_category(&self, name: &str, description: Option<&str>) -> ExamCategory {
        let category = ExamCategory {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Some(Utc::now()),
        };
        self.inner.lock().await.categories.push(category.clone());
        category
    }

    /// Adds a previous-year paper with its questions.
    pub async fn add_paper(
        &self,
        paper_name: &str,
        exam_type: &str,
        year: i32,
        duration_minutes: i32,
        questions: &[NewQuestion],
    ) -> TestSummary {
        let summary = TestSummary {
            id: Uuid::new_v4(),
            kind: TestKind::Paper,
            name: paper_name.to_string(),
            subject: exam_type.to_string(),
            exam_type: Some(exam_type.to_string()),
            difficulty: None,
            year: Some(year),
            questions_count: questions.len() as i32,
            duration_minutes,
            created_at: Some(Utc::now()),
        };

        let mut inner = self.inner.lock().await;
        inner.insert_questions(summary.test_ref(), questions);
        inner.tests.push(summary.clone());
        summary
    }
}

impl Inner {
    fn insert_questions(&mut self, owner: TestRef, questions: &[NewQuestion]) {
        let now = Utc::now();
        self.questions.extend(questions.iter().map(|q| Question {
            id: Uuid::new_v4(),
            owner,
            question_text: q.question_text.clone(),
            option_a: q.option_a.clone(),
            option_b: q.option_b.clone(),
            option_c: q.option_c.clone(),
            option_d: q.option_d.clone(),
            correct_answer: q.correct_answer,
            explanation: q.explanation.clone(),
            created_at: Some(now),
        }));
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_exam_categories(&self) -> Result<Vec<ExamCategory>, StoreError> {
        let mut categories = self.inner.lock().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_tests(&self, kind: TestKind) -> Result<Vec<TestSummary>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tests
            .iter()
            .rev()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect())
    }

    async fn find_test(&self, test: TestRef) -> Result<Option<TestSummary>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.tests.iter().find(|t| t.test_ref() == test).cloned())
    }

    async fn questions_for(&self, test: TestRef) -> Result<Vec<Question>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.owner == test)
            .cloned()
            .collect())
    }

    async fn create_test_with_questions(
        &self,
        test: NewMockTest,
        questions: &[NewQuestion],
    ) -> Result<TestSummary, StoreError> {
        let summary = TestSummary {
            id: Uuid::new_v4(),
            kind: TestKind::Test,
            name: test.title,
            subject: test.subject,
            exam_type: test.exam_type,
            difficulty: test.difficulty,
            year: None,
            questions_count: questions.len() as i32,
            duration_minutes: test.duration_minutes,
            created_at: Some(Utc::now()),
        };

        let mut inner = self.inner.lock().await;
        inner.insert_questions(summary.test_ref(), questions);
        inner.tests.push(summary.clone());
        Ok(summary)
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<Attempt, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.tests.iter().any(|t| t.test_ref() == attempt.source) {
            return Err(StoreError::NotFound("Test"));
        }

        let row = Attempt {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            source: attempt.source,
            total_questions: attempt.total_questions,
            score: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            time_taken_minutes: None,
            completed_at: None,
            created_at: Some(Utc::now()),
        };
        inner.attempts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError> {
        Ok(self.inner.lock().await.attempts.get(&id).cloned())
    }

    async fn list_completed_attempts(&self, user_id: Uuid) -> Result<Vec<Attempt>, StoreError> {
        let inner = self.inner.lock().await;
        let mut attempts: Vec<Attempt> = inner
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.is_completed())
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(attempts)
    }

    async fn record_submission(
        &self,
        attempt_id: Uuid,
        outcome: AttemptOutcome,
        answers: &[NewUserAnswer],
    ) -> Result<Attempt, StoreError> {
        let mut inner = self.inner.lock().await;

        let attempt = inner
            .attempts
            .get(&attempt_id)
            .ok_or(StoreError::NotFound("Attempt"))?;
        if attempt.is_completed() {
            return Err(StoreError::AlreadyCompleted);
        }

        let mut seen = HashSet::new();
        for answer in answers {
            if !seen.insert(answer.question_id) {
                return Err(StoreError::InvalidRow(format!(
                    "duplicate answer for question {}",
                    answer.question_id
                )));
            }
        }

        inner.answers.extend(answers.iter().map(|a| UserAnswer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id: a.question_id,
            selected_answer: a.selected_answer,
            is_correct: a.is_correct,
            is_bookmarked: false,
        }));

        let attempt = inner
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StoreError::NotFound("Attempt"))?;
        attempt.score = outcome.score;
        attempt.correct_answers = outcome.correct_answers;
        attempt.incorrect_answers = outcome.incorrect_answers;
        attempt.time_taken_minutes = Some(outcome.time_taken_minutes);
        attempt.completed_at = Some(Utc::now());

        Ok(attempt.clone())
    }

    async fn answers_with_questions(
        &self,
        attempt_id: Uuid,
    ) -> Result<Vec<(UserAnswer, Question)>, StoreError> {
        let inner = self.inner.lock().await;
        let by_id: HashMap<Uuid, &Question> = inner.questions.iter().map(|q| (q.id, q)).collect();

        inner
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .map(|a| {
                by_id
                    .get(&a.question_id)
                    .map(|q| (a.clone(), (*q).clone()))
                    .ok_or(StoreError::NotFound("Question"))
            })
            .collect()
    }

    async fn ranking(&self, test: TestRef, score: i32) -> Result<Ranking, StoreError> {
        let inner = self.inner.lock().await;
        let completed = inner
            .attempts
            .values()
            .filter(|a| a.source == test && a.is_completed());

        let (mut higher, mut participants) = (0, 0);
        for attempt in completed {
            participants += 1;
            if attempt.score > score {
                higher += 1;
            }
        }

        Ok(Ranking {
            position: higher + 1,
            participants,
        })
    }

    async fn get_setting(&self, key: &str) -> Result<Option<AdminSetting>, StoreError> {
        Ok(self.inner.lock().await.settings.get(key).cloned())
    }

    async fn list_settings(&self) -> Result<Vec<AdminSetting>, StoreError> {
        Ok(self.inner.lock().await.settings.values().cloned().collect())
    }

    async fn put_setting(
        &self,
        key: &str,
        value: &str,
        updated_by: Uuid,
    ) -> Result<AdminSetting, StoreError> {
        let setting = AdminSetting {
            key: key.to_string(),
            value: Some(value.to_string()),
            updated_by: Some(updated_by),
            updated_at: Some(Utc::now()),
        };
        self.inner
            .lock()
            .await
            .settings
            .insert(key.to_string(), setting.clone());
        Ok(setting)
    }

    async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut inserted = 0;

        for article in articles {
            if !inner.article_keys.insert(article.title_key.clone()) {
                continue;
            }
            inner.articles.push(Article {
                id: Uuid::new_v4(),
                title: article.title.clone(),
                description: article.description.clone(),
                content: article.content.clone(),
                category: article.category.clone(),
                language: Some(article.language.clone()),
                source: article.source.clone(),
                published_date: article.published_date,
                image_url: article.image_url.clone(),
                created_at: Some(Utc::now()),
            });
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn list_articles(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let inner = self.inner.lock().await;
        let mut articles: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| language.is_none_or(|lang| a.language.as_deref() == Some(lang)))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            b.published_date
                .cmp(&a.published_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        articles.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(articles)
    }
}
