// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};
use exam_prep::{
    config::{Config, GenerationConfig},
    models::{
        question::{AnswerOption, NewQuestion},
        test::{NewMockTest, TestSummary},
    },
    routes,
    state::AppState,
    store::{ContentStore, MemoryStore},
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn token(user_id: Uuid, role: &str) -> String {
    sign_jwt(user_id, role, JWT_SECRET, 600).expect("Failed to sign token")
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", token(user_id, "user"))
}

pub fn admin_bearer() -> String {
    format!("Bearer {}", token(Uuid::new_v4(), "admin"))
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app(generation: GenerationConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        generation,
    };

    let state = AppState::new(store.clone(), config).expect("Failed to build state");
    let app = routes::create_router(state);

    let address = serve(app).await;

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

/// Binds port 0 and serves `app` in the background. Returns the base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

pub fn question(text: &str, key: AnswerOption) -> NewQuestion {
    NewQuestion {
        question_text: text.to_string(),
        option_a: "Option A".to_string(),
        option_b: "Option B".to_string(),
        option_c: "Option C".to_string(),
        option_d: "Option D".to_string(),
        correct_answer: key,
        explanation: Some(format!("Because of {text}")),
    }
}

/// Seeds a mock test whose questions have the given answer keys.
pub async fn seed_test(store: &MemoryStore, keys: &[AnswerOption], minutes: i32) -> TestSummary {
    let questions: Vec<NewQuestion> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| question(&format!("Question {}", i + 1), *key))
        .collect();

    store
        .create_test_with_questions(
            NewMockTest {
                title: "Indian Polity Mock".to_string(),
                subject: "Polity".to_string(),
                difficulty: Some("Medium".to_string()),
                exam_type: Some("UPSC".to_string()),
                duration_minutes: minutes,
            },
            &questions,
        )
        .await
        .expect("Failed to seed test")
}

/// Canned response of one fake upstream endpoint.
#[derive(Clone)]
pub struct Canned {
    pub status: u16,
    pub body: Value,
}

impl Canned {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({"error": {"message": "upstream says no"}}),
        }
    }

    /// A chat-completions reply whose message content is `content`.
    pub fn chat(content: &str) -> Self {
        Self::ok(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }
}

#[derive(Default)]
struct Recorded {
    news: Option<Canned>,
    llm: Option<Canned>,
    news_calls: usize,
    llm_prompts: Vec<Value>,
    news_api_keys: Vec<String>,
}

/// News provider and language-model gateway stand-ins.
#[derive(Clone, Default)]
pub struct FakeUpstream {
    inner: Arc<Mutex<Recorded>>,
}

impl FakeUpstream {
    pub fn set_news(&self, canned: Canned) {
        self.inner.lock().unwrap().news = Some(canned);
    }

    pub fn set_llm(&self, canned: Canned) {
        self.inner.lock().unwrap().llm = Some(canned);
    }

    pub fn news_calls(&self) -> usize {
        self.inner.lock().unwrap().news_calls
    }

    pub fn llm_calls(&self) -> usize {
        self.inner.lock().unwrap().llm_prompts.len()
    }

    pub fn news_api_keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().news_api_keys.clone()
    }

    /// User prompt of the last chat-completions request.
    pub fn last_user_prompt(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.llm_prompts.last().and_then(|payload| {
            payload["messages"][1]["content"].as_str().map(str::to_string)
        })
    }

    /// Serves both fakes and returns a generation config pointing at them.
    pub async fn spawn(&self) -> GenerationConfig {
        let app = Router::new()
            .route("/news/top-headlines", get(fake_news))
            .route("/llm/chat/completions", post(fake_llm))
            .with_state(self.clone());
        let base = serve(app).await;

        GenerationConfig {
            news_api_base_url: format!("{base}/news"),
            news_api_key: Some("env-news-key".to_string()),
            llm_api_base_url: format!("{base}/llm"),
            llm_api_key: Some("env-llm-key".to_string()),
            ..GenerationConfig::default()
        }
    }
}

fn respond(canned: Option<Canned>) -> (StatusCode, Json<Value>) {
    let canned = canned.unwrap_or_else(|| Canned::status(500));
    (
        StatusCode::from_u16(canned.status).unwrap(),
        Json(canned.body),
    )
}

async fn fake_news(
    State(fake): State<FakeUpstream>,
    headers: axum::http::HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut inner = fake.inner.lock().unwrap();
    inner.news_calls += 1;
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        inner.news_api_keys.push(key.to_string());
    }
    respond(inner.news.clone())
}

async fn fake_llm(
    State(fake): State<FakeUpstream>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut inner = fake.inner.lock().unwrap();
    inner.llm_prompts.push(payload);
    respond(inner.llm.clone())
}
