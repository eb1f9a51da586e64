// src/services/session_manager.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, NewAttempt},
        question::AnswerOption,
        test::TestRef,
    },
    services::session::{SessionState, SessionView, TestSession, Tick},
    store::{ContentStore, StoreError},
};

/// What caused a finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

struct LiveSession {
    session: TestSession,
    countdown: Option<JoinHandle<()>>,
}

type SharedSession = Arc<Mutex<LiveSession>>;
type Registry = Arc<RwLock<HashMap<Uuid, SharedSession>>>;

/// Holds every in-progress test session, keyed by attempt id.
///
/// Each session has its own mutex; the countdown task and request handlers
/// both go through it, so at most one of them can finalize an attempt.
/// Lock order is session first, registry second, and the registry lock is
/// never held while waiting on a session.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn ContentStore>,
    registry: Registry,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            registry: Arc::default(),
        }
    }

    /// Opens an attempt for `test` and starts its clock.
    pub async fn start(&self, user_id: Uuid, test: TestRef) -> Result<SessionView, AppError> {
        let summary = self
            .store
            .find_test(test)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", test.kind.fallback_name())))?;

        let questions = self.store.questions_for(test).await?;
        if questions.is_empty() {
            tracing::warn!(test_id = %test.id, kind = %test.kind, "Test has no questions");
            return Err(AppError::EmptyQuestionSet);
        }

        let attempt = self
            .store
            .create_attempt(NewAttempt {
                user_id,
                source: test,
                total_questions: questions.len() as i32,
            })
            .await?;

        let session = TestSession::new(&attempt, summary, questions);
        let view = session.view();
        let timed = session.remaining_seconds() > 0;

        let live = Arc::new(Mutex::new(LiveSession {
            session,
            countdown: None,
        }));
        self.registry
            .write()
            .await
            .insert(attempt.id, Arc::clone(&live));

        if timed {
            let handle = self.spawn_countdown(attempt.id, Arc::clone(&live));
            live.lock().await.countdown = Some(handle);
        }

        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %user_id,
            test_id = %test.id,
            questions = view.total_questions,
            "Test session started"
        );

        Ok(view)
    }

    pub async fn view(&self, user_id: Uuid, attempt_id: Uuid) -> Result<SessionView, AppError> {
        self.mutate(user_id, attempt_id, |_| Ok(())).await.map(|(_, view)| view)
    }

    pub async fn select_answer(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        question_id: Uuid,
        option: AnswerOption,
    ) -> Result<SessionView, AppError> {
        self.mutate(user_id, attempt_id, |s| s.select_answer(question_id, option))
            .await
            .map(|(_, view)| view)
    }

    pub async fn clear_answer(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        question_id: Uuid,
    ) -> Result<SessionView, AppError> {
        self.mutate(user_id, attempt_id, |s| s.clear_answer(question_id))
            .await
            .map(|(_, view)| view)
    }

    pub async fn toggle_mark(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        question_id: Uuid,
    ) -> Result<SessionView, AppError> {
        self.mutate(user_id, attempt_id, |s| s.toggle_mark(question_id))
            .await
            .map(|(_, view)| view)
    }

    pub async fn navigate(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        index: i64,
    ) -> Result<SessionView, AppError> {
        self.mutate(user_id, attempt_id, |s| s.navigate(index))
            .await
            .map(|(_, view)| view)
    }

    /// Manual submission. On success the session leaves the registry.
    pub async fn submit(&self, user_id: Uuid, attempt_id: Uuid) -> Result<Attempt, AppError> {
        let shared = self.live(user_id, attempt_id).await?;
        let mut live = shared.lock().await;
        ensure_owner(&live.session, user_id)?;

        let result = finalize(self.store.as_ref(), &mut live, SubmitTrigger::Manual).await;

        match &result {
            Ok(_) => {
                drop(live);
                self.registry.write().await.remove(&attempt_id);
            }
            Err(AppError::SubmitFailed(_)) => self.resume_countdown(&mut live, &shared),
            Err(_) => {}
        }

        result
    }

    pub async fn is_live(&self, attempt_id: Uuid) -> bool {
        self.registry.read().await.contains_key(&attempt_id)
    }

    async fn mutate<T>(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        f: impl FnOnce(&mut TestSession) -> Result<T, AppError>,
    ) -> Result<(T, SessionView), AppError> {
        let shared = self.live(user_id, attempt_id).await?;
        let mut live = shared.lock().await;
        ensure_owner(&live.session, user_id)?;

        let value = f(&mut live.session)?;
        self.resume_countdown(&mut live, &shared);

        Ok((value, live.session.view()))
    }

    async fn live(&self, user_id: Uuid, attempt_id: Uuid) -> Result<SharedSession, AppError> {
        if let Some(shared) = self.registry.read().await.get(&attempt_id) {
            return Ok(Arc::clone(shared));
        }

        // Not live: explain why from the stored attempt.
        match self.store.find_attempt(attempt_id).await? {
            None => Err(AppError::NotFound("Attempt not found".to_string())),
            Some(a) if a.user_id != user_id => Err(AppError::Forbidden(
                "Attempt belongs to another user".to_string(),
            )),
            Some(a) if a.is_completed() => Err(AppError::Conflict(
                "Attempt has already been submitted".to_string(),
            )),
            Some(_) => Err(AppError::NotFound(
                "Test session is no longer active".to_string(),
            )),
        }
    }

    /// Restarts the clock of an in-progress session that lost it to a failed submit.
    fn resume_countdown(&self, live: &mut LiveSession, shared: &SharedSession) {
        let running = live.countdown.as_ref().is_some_and(|h| !h.is_finished());
        let open = matches!(
            live.session.state(),
            SessionState::InProgress | SessionState::SubmitFailed
        );
        if running || !open || live.session.remaining_seconds() <= 0 {
            return;
        }

        let attempt_id = live.session.attempt_id();
        tracing::debug!(attempt_id = %attempt_id, "Resuming countdown");
        live.countdown = Some(self.spawn_countdown(attempt_id, Arc::clone(shared)));
    }

    fn spawn_countdown(&self, attempt_id: Uuid, shared: SharedSession) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;

                let mut live = shared.lock().await;
                match live.session.tick() {
                    Tick::Running => continue,
                    Tick::Stopped => break,
                    Tick::Expired => {
                        tracing::info!(attempt_id = %attempt_id, "Time is up, submitting test");
                        match finalize(store.as_ref(), &mut live, SubmitTrigger::Timeout).await {
                            Ok(_) => {
                                drop(live);
                                registry.write().await.remove(&attempt_id);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    attempt_id = %attempt_id,
                                    error = %e,
                                    "Automatic submission failed, waiting for manual retry"
                                );
                            }
                        }
                        break;
                    }
                }
            }
        })
    }
}

fn ensure_owner(session: &TestSession, user_id: Uuid) -> Result<(), AppError> {
    if session.user_id() == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Attempt belongs to another user".to_string(),
        ))
    }
}

/// Grades the session and persists answers and final stats in one store call.
async fn finalize(
    store: &dyn ContentStore,
    live: &mut LiveSession,
    trigger: SubmitTrigger,
) -> Result<Attempt, AppError> {
    let draft = live.session.begin_submit()?;

    // The countdown must not fire once a submission has begun. A timeout
    // trigger runs inside the countdown task itself and only drops its handle.
    if let Some(handle) = live.countdown.take() {
        if trigger == SubmitTrigger::Manual {
            handle.abort();
        }
    }

    let attempt_id = live.session.attempt_id();
    match store
        .record_submission(attempt_id, draft.outcome, &draft.grade.answers)
        .await
    {
        Ok(attempt) => {
            live.session.complete();
            tracing::info!(
                attempt_id = %attempt_id,
                trigger = ?trigger,
                score = attempt.score,
                correct = attempt.correct_answers,
                incorrect = attempt.incorrect_answers,
                "Test submitted"
            );
            Ok(attempt)
        }
        Err(StoreError::AlreadyCompleted) => {
            live.session.complete();
            tracing::warn!(attempt_id = %attempt_id, "Attempt was finalized elsewhere");
            Err(AppError::Conflict(
                "Attempt has already been submitted".to_string(),
            ))
        }
        Err(e) => {
            live.session.fail_submit();
            Err(AppError::SubmitFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{
            article::{Article, NewArticle},
            attempt::{AttemptOutcome, NewUserAnswer, Ranking, UserAnswer},
            exam_category::ExamCategory,
            question::{NewQuestion, Question},
            setting::AdminSetting,
            test::{NewMockTest, TestKind, TestSummary},
        },
        store::MemoryStore,
    };

    /// Memory store that fails the first `failures` submissions and counts calls.
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicUsize,
        submissions: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: AtomicUsize::new(failures),
                submissions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentStore for FlakyStore {
        async fn list_exam_categories(&self) -> Result<Vec<ExamCategory>, StoreError> {
            self.inner.list_exam_categories().await
        }
        async fn list_tests(&self, kind: TestKind) -> Result<Vec<TestSummary>, StoreError> {
            self.inner.list_tests(kind).await
        }
        async fn find_test(&self, test: TestRef) -> Result<Option<TestSummary>, StoreError> {
            self.inner.find_test(test).await
        }
        async fn questions_for(&self, test: TestRef) -> Result<Vec<Question>, StoreError> {
            self.inner.questions_for(test).await
        }
        async fn create_test_with_questions(
            &self,
            test: NewMockTest,
            questions: &[NewQuestion],
        ) -> Result<TestSummary, StoreError> {
            self.inner.create_test_with_questions(test, questions).await
        }
        async fn create_attempt(&self, attempt: NewAttempt) -> Result<Attempt, StoreError> {
            self.inner.create_attempt(attempt).await
        }
        async fn find_attempt(&self, id: Uuid) -> Result<Option<Attempt>, StoreError> {
            self.inner.find_attempt(id).await
        }
        async fn list_completed_attempts(&self, user_id: Uuid) -> Result<Vec<Attempt>, StoreError> {
            self.inner.list_completed_attempts(user_id).await
        }
        async fn record_submission(
            &self,
            attempt_id: Uuid,
            outcome: AttemptOutcome,
            answers: &[NewUserAnswer],
        ) -> Result<Attempt, StoreError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let should_fail = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(StoreError::InvalidRow("simulated outage".to_string()));
            }
            self.inner.record_submission(attempt_id, outcome, answers).await
        }
        async fn answers_with_questions(
            &self,
            attempt_id: Uuid,
        ) -> Result<Vec<(UserAnswer, Question)>, StoreError> {
            self.inner.answers_with_questions(attempt_id).await
        }
        async fn ranking(&self, test: TestRef, score: i32) -> Result<Ranking, StoreError> {
            self.inner.ranking(test, score).await
        }
        async fn get_setting(&self, key: &str) -> Result<Option<AdminSetting>, StoreError> {
            self.inner.get_setting(key).await
        }
        async fn list_settings(&self) -> Result<Vec<AdminSetting>, StoreError> {
            self.inner.list_settings().await
        }
        async fn put_setting(
            &self,
            key: &str,
            value: &str,
            updated_by: Uuid,
        ) -> Result<AdminSetting, StoreError> {
            self.inner.put_setting(key, value, updated_by).await
        }
        async fn insert_articles(&self, articles: &[NewArticle]) -> Result<u64, StoreError> {
            self.inner.insert_articles(articles).await
        }
        async fn list_articles(
            &self,
            language: Option<&str>,
            limit: i64,
        ) -> Result<Vec<Article>, StoreError> {
            self.inner.list_articles(language, limit).await
        }
    }

    fn new_question(key: AnswerOption) -> NewQuestion {
        NewQuestion {
            question_text: "Which article deals with the Finance Commission?".to_string(),
            option_a: "280".to_string(),
            option_b: "300".to_string(),
            option_c: "312".to_string(),
            option_d: "356".to_string(),
            correct_answer: key,
            explanation: None,
        }
    }

    async fn seed(store: &dyn ContentStore, keys: &[AnswerOption], minutes: i32) -> TestRef {
        let questions: Vec<NewQuestion> = keys.iter().copied().map(new_question).collect();
        store
            .create_test_with_questions(
                NewMockTest {
                    title: "Polity Mock".to_string(),
                    subject: "Polity".to_string(),
                    difficulty: Some("Medium".to_string()),
                    exam_type: Some("UPSC".to_string()),
                    duration_minutes: minutes,
                },
                &questions,
            )
            .await
            .unwrap()
            .test_ref()
    }

    use AnswerOption::{A, B, C};

    #[tokio::test]
    async fn test_start_unknown_test_is_not_found() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let result = manager
            .start(Uuid::new_v4(), TestRef::paper(Uuid::new_v4()))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_start_empty_test_is_rejected_without_attempt() {
        let store = Arc::new(MemoryStore::new());
        let test = seed(store.as_ref(), &[], 10).await;
        let user = Uuid::new_v4();
        let manager = SessionManager::new(store.clone());

        let result = manager.start(user, test).await;

        assert!(matches!(result, Err(AppError::EmptyQuestionSet)));
        assert!(store.list_completed_attempts(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_user_is_forbidden() {
        let store = Arc::new(MemoryStore::new());
        let test = seed(store.as_ref(), &[A], 10).await;
        let manager = SessionManager::new(store);

        let view = manager.start(Uuid::new_v4(), test).await.unwrap();
        let result = manager.view(Uuid::new_v4(), view.attempt_id).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_submit_scores_and_closes_session() {
        let store = Arc::new(MemoryStore::new());
        let test = seed(store.as_ref(), &[A, B, C], 10).await;
        let manager = SessionManager::new(store.clone());
        let user = Uuid::new_v4();

        let view = manager.start(user, test).await.unwrap();
        let ids: Vec<Uuid> = store
            .questions_for(test)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        manager.select_answer(user, view.attempt_id, ids[0], A).await.unwrap();

        tokio::time::sleep(Duration::from_secs(125)).await;
        let attempt = manager.submit(user, view.attempt_id).await.unwrap();

        assert_eq!(attempt.correct_answers, 1);
        assert_eq!(attempt.incorrect_answers, 0);
        assert_eq!(attempt.score, 33);
        assert_eq!(attempt.time_taken_minutes, Some(2));
        assert!(!manager.is_live(view.attempt_id).await);

        let again = manager.submit(user, view.attempt_id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_expiry_submits_once() {
        let store = Arc::new(FlakyStore::new(0));
        let test = seed(store.as_ref(), &[A, B], 1).await;
        let manager = SessionManager::new(store.clone());
        let user = Uuid::new_v4();

        let view = manager.start(user, test).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        let attempt = store.find_attempt(view.attempt_id).await.unwrap().unwrap();
        assert!(attempt.is_completed());
        assert_eq!(attempt.time_taken_minutes, Some(1));
        assert_eq!(store.submissions.load(Ordering::SeqCst), 1);
        assert!(!manager.is_live(view.attempt_id).await);

        let late = manager.submit(user, view.attempt_id).await;
        assert!(matches!(late, Err(AppError::Conflict(_))));
        assert_eq!(store.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_submit_racing_expiry_finalizes_once() {
        let store = Arc::new(FlakyStore::new(0));
        let test = seed(store.as_ref(), &[A, B], 1).await;
        let manager = SessionManager::new(store.clone());
        let user = Uuid::new_v4();

        let view = manager.start(user, test).await.unwrap();
        tokio::time::sleep(Duration::from_millis(59_500)).await;

        let (manual, _) = tokio::join!(
            manager.submit(user, view.attempt_id),
            tokio::time::sleep(Duration::from_secs(2)),
        );
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(manual.is_ok() || matches!(manual, Err(AppError::Conflict(_))));
        assert_eq!(store.submissions.load(Ordering::SeqCst), 1);
        assert_eq!(
            store
                .answers_with_questions(view.attempt_id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_preserves_answers_for_retry() {
        let store = Arc::new(FlakyStore::new(1));
        let test = seed(store.as_ref(), &[A, B], 10).await;
        let manager = SessionManager::new(store.clone());
        let user = Uuid::new_v4();

        let view = manager.start(user, test).await.unwrap();
        let ids: Vec<Uuid> = store
            .questions_for(test)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        manager.select_answer(user, view.attempt_id, ids[0], A).await.unwrap();
        manager.select_answer(user, view.attempt_id, ids[1], C).await.unwrap();

        let failed = manager.submit(user, view.attempt_id).await;
        assert!(matches!(failed, Err(AppError::SubmitFailed(_))));

        let view = manager.view(user, view.attempt_id).await.unwrap();
        assert_eq!(view.state, SessionState::SubmitFailed);
        assert_eq!(view.counts.answered, 2);

        // The clock keeps running after the failure.
        let before = view.remaining_seconds;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let later = manager.view(user, view.attempt_id).await.unwrap();
        assert!(later.remaining_seconds < before);

        let attempt = manager.submit(user, view.attempt_id).await.unwrap();
        assert_eq!(attempt.correct_answers, 1);
        assert_eq!(attempt.incorrect_answers, 1);
        assert_eq!(attempt.score, 50);
        assert_eq!(store.submissions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_still_auto_submits_at_deadline() {
        let store = Arc::new(FlakyStore::new(1));
        let test = seed(store.as_ref(), &[A, B], 1).await;
        let manager = SessionManager::new(store.clone());
        let user = Uuid::new_v4();

        let view = manager.start(user, test).await.unwrap();
        let ids: Vec<Uuid> = store
            .questions_for(test)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        manager.select_answer(user, view.attempt_id, ids[0], A).await.unwrap();

        let failed = manager.submit(user, view.attempt_id).await;
        assert!(matches!(failed, Err(AppError::SubmitFailed(_))));

        // Only reads from here on; the countdown alone must finish the attempt.
        tokio::time::sleep(Duration::from_secs(30)).await;
        let halfway = manager.view(user, view.attempt_id).await.unwrap();
        assert_eq!(halfway.state, SessionState::SubmitFailed);
        assert!(halfway.remaining_seconds < view.remaining_seconds);
        assert!(halfway.remaining_seconds > 0);

        tokio::time::sleep(Duration::from_secs(35)).await;

        let attempt = store.find_attempt(view.attempt_id).await.unwrap().unwrap();
        assert!(attempt.is_completed());
        assert_eq!(attempt.correct_answers, 1);
        assert_eq!(store.submissions.load(Ordering::SeqCst), 2);
        assert!(!manager.is_live(view.attempt_id).await);
    }
}
