// src/services/generation/mod.rs

//! Content generation pipeline: news headlines summarized by a language
//! model into articles, and AI-generated mock tests.

pub mod dedup;
pub mod llm;
pub mod news;
pub mod parse;

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    config::{
        GenerationConfig, LLM_API_KEY_SETTING, MINUTES_PER_GENERATED_QUESTION,
        NEWS_API_KEY_SETTING,
    },
    models::{
        article::{Language, NewArticle},
        question::{AnswerOption, NewQuestion},
        test::{GenerateTestRequest, NewMockTest, TestSummary},
    },
    store::{ContentStore, StoreError},
    utils::html::clean_html,
};

use self::{
    dedup::TitleDedup,
    llm::LlmClient,
    news::{Headline, NewsClient},
    parse::parse_model_array,
};

pub const DEFAULT_ARTICLE_CATEGORY: &str = "current-affairs";
pub const DEFAULT_ARTICLE_SOURCE: &str = "AI Generated";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Neither an admin setting nor the environment provides the key.
    #[error("{0} is not configured")]
    MissingKey(&'static str),

    #[error("upstream rate limit exceeded")]
    RateLimited,

    #[error("upstream payment required")]
    PaymentRequired,

    #[error("{service} returned HTTP {status}")]
    Upstream { service: &'static str, status: u16 },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("model output could not be parsed: {0}")]
    Malformed(String),

    #[error("model returned no questions")]
    EmptyQuestionList,

    #[error("generated question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

const NEWS_SYSTEM_PROMPT: &str = r#"You are an editor preparing current-affairs material for Indian competitive exams (UPSC, SSC, Banking, State PSC).
Return ONLY a valid JSON array. Each item must have exactly this structure:
{
  "title": "Headline",
  "description": "Two sentence summary",
  "content": "Exam-focused explanation in 3 to 5 sentences with key facts, names and numbers",
  "category": "national" | "international" | "economy" | "science" | "environment" | "sports" | "current-affairs",
  "source": "Original source name or null",
  "image_url": "Original image URL or null"
}"#;

const TEST_SYSTEM_PROMPT: &str = r#"You are an expert test creator. Generate high-quality multiple-choice questions for competitive exams. Return ONLY a valid JSON array of questions. Each question must have exactly this structure:
{
  "question_text": "The question text",
  "option_a": "First option",
  "option_b": "Second option",
  "option_c": "Third option",
  "option_d": "Fourth option",
  "correct_answer": "a" (or "b", "c", "d"),
  "explanation": "Brief explanation of the correct answer"
}"#;

/// Article item as written by the model. Every field is optional so one
/// sloppy item does not spoil the batch.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneratedArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

/// Question item as written by the model.
#[derive(Debug, Deserialize)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl GeneratedQuestion {
    fn into_new_question(self, index: usize) -> Result<NewQuestion, GenerationError> {
        let invalid = |reason: String| GenerationError::InvalidQuestion { index, reason };

        let correct_answer = self
            .correct_answer
            .parse::<AnswerOption>()
            .map_err(invalid)?;
        let texts = [
            &self.question_text,
            &self.option_a,
            &self.option_b,
            &self.option_c,
            &self.option_d,
        ];
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("question or option text is blank".to_string()));
        }

        Ok(NewQuestion {
            question_text: self.question_text.trim().to_string(),
            option_a: self.option_a.trim().to_string(),
            option_b: self.option_b.trim().to_string(),
            option_c: self.option_c.trim().to_string(),
            option_d: self.option_d.trim().to_string(),
            correct_answer,
            explanation: self
                .explanation
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        })
    }
}

pub struct GenerationService {
    store: Arc<dyn ContentStore>,
    config: GenerationConfig,
    llm: LlmClient,
    news: NewsClient,
    dedup: Box<dyn TitleDedup>,
}

impl GenerationService {
    pub fn new(store: Arc<dyn ContentStore>, config: GenerationConfig) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.upstream_timeout)
            .build()?;

        Ok(Self {
            store,
            llm: LlmClient::new(http.clone(), &config),
            news: NewsClient::new(http, &config),
            dedup: dedup::policy(config.dedup),
            config,
        })
    }

    /// Admin setting first, environment second.
    async fn resolve_key(
        &self,
        setting: &'static str,
        fallback: Option<&String>,
    ) -> Result<String, GenerationError> {
        let stored = self
            .store
            .get_setting(setting)
            .await?
            .and_then(|s| s.value)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        stored
            .or_else(|| fallback.cloned())
            .ok_or(GenerationError::MissingKey(setting))
    }

    /// Fetches headlines, has the model summarize them in `language` and
    /// stores the result. Returns the number of articles actually inserted.
    ///
    /// Missing headlines switch to a pure-generation prompt. Unparsable model
    /// output yields zero articles.
    pub async fn fetch_and_summarize_news(&self, language: Language) -> Result<u64, GenerationError> {
        let news_key = self
            .resolve_key(NEWS_API_KEY_SETTING, self.config.news_api_key.as_ref())
            .await?;
        let llm_key = self
            .resolve_key(LLM_API_KEY_SETTING, self.config.llm_api_key.as_ref())
            .await?;

        let headlines = match self.news.top_headlines(&news_key).await {
            Ok(items) if !items.is_empty() => Some(items),
            Ok(_) => {
                tracing::warn!("News provider returned no headlines, generating instead");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "News provider failed, generating instead");
                None
            }
        };

        let prompt = news_prompt(language, headlines.as_deref(), self.news.category());
        let reply = self.llm.complete(&llm_key, NEWS_SYSTEM_PROMPT, &prompt).await?;

        let items: Vec<GeneratedArticle> = parse_model_array(&reply).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unparsable news reply");
            Vec::new()
        });

        let articles = normalize_articles(items, language, self.dedup.as_ref(), Utc::now().date_naive());
        if articles.is_empty() {
            tracing::info!(language = language.as_str(), "No articles to store");
            return Ok(0);
        }

        let inserted = self.store.insert_articles(&articles).await?;
        tracing::info!(
            language = language.as_str(),
            generated = articles.len(),
            inserted,
            "Stored news articles"
        );
        Ok(inserted)
    }

    /// Generates a mock test and stores it with its questions as one unit.
    pub async fn generate_test(&self, req: &GenerateTestRequest) -> Result<TestSummary, GenerationError> {
        let llm_key = self
            .resolve_key(LLM_API_KEY_SETTING, self.config.llm_api_key.as_ref())
            .await?;

        let subject = req.subject.trim();
        let difficulty = req.difficulty.trim();
        tracing::info!(
            subject,
            difficulty,
            count = req.questions_count,
            "Generating mock test"
        );

        let prompt = test_prompt(req);
        let reply = self.llm.complete(&llm_key, TEST_SYSTEM_PROMPT, &prompt).await?;

        let generated: Vec<GeneratedQuestion> = parse_model_array(&reply)?;
        if generated.is_empty() {
            return Err(GenerationError::EmptyQuestionList);
        }
        if generated.len() != req.questions_count as usize {
            tracing::warn!(
                requested = req.questions_count,
                received = generated.len(),
                "Model returned a different number of questions"
            );
        }

        let questions = generated
            .into_iter()
            .enumerate()
            .map(|(i, q)| q.into_new_question(i))
            .collect::<Result<Vec<_>, _>>()?;

        let test = NewMockTest {
            title: format!("AI Generated {subject} Test - {difficulty}"),
            subject: subject.to_string(),
            difficulty: Some(difficulty.to_string()),
            exam_type: Some(req.exam_type.trim().to_string()),
            duration_minutes: questions.len() as i32 * MINUTES_PER_GENERATED_QUESTION,
        };

        let summary = self.store.create_test_with_questions(test, &questions).await?;
        tracing::info!(test_id = %summary.id, questions = summary.questions_count, "Mock test created");
        Ok(summary)
    }

    /// Runs the news refresh for every language on a fixed cadence.
    pub fn spawn_news_refresh(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                for language in Language::ALL {
                    match self.fetch_and_summarize_news(language).await {
                        Ok(count) => tracing::info!(
                            language = language.as_str(),
                            count,
                            "Scheduled news refresh finished"
                        ),
                        Err(e) => tracing::error!(
                            language = language.as_str(),
                            error = %e,
                            "Scheduled news refresh failed"
                        ),
                    }
                }
            }
        })
    }
}

fn news_prompt(language: Language, headlines: Option<&[Headline]>, category: &str) -> String {
    let lang = language.display_name();
    match headlines.and_then(|h| serde_json::to_string(h).ok()) {
        Some(raw) => format!(
            "Below are today's {category} headlines from India as JSON. Keep only the items relevant \
             for competitive exams, then summarize each one in {lang}. Keep the source name and \
             image URL from the input when present. Return ONLY the JSON array.\n\n{raw}"
        ),
        None => format!(
            "No fresh headlines are available. Write 10 important recent current-affairs items \
             relevant for Indian competitive exams, in {lang}, covering national, international, \
             economy and science topics. Return ONLY the JSON array."
        ),
    }
}

fn test_prompt(req: &GenerateTestRequest) -> String {
    let focus = match req.exam_type.trim() {
        "" | "General" => "Indian competitive exams like UPSC, SSC, Banking, etc.".to_string(),
        exam => format!("the {exam} exam in India."),
    };
    format!(
        "Generate {count} multiple-choice questions for {subject} at {difficulty} difficulty level. \
         Focus on topics relevant to {focus} Write the questions, options and explanations in \
         {lang}. Return ONLY the JSON array, no other text.",
        count = req.questions_count,
        subject = req.subject.trim(),
        difficulty = req.difficulty.trim(),
        lang = req.language.display_name(),
    )
}

/// Turns model items into storable articles.
///
/// Items without a usable title are dropped, as are repeats of a key
/// already seen in this batch.
pub fn normalize_articles(
    items: Vec<GeneratedArticle>,
    language: Language,
    dedup: &dyn TitleDedup,
    today: NaiveDate,
) -> Vec<NewArticle> {
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter_map(|item| {
            let title = clean_text(item.title)?;
            let title_key = dedup.key(&title);
            if title_key.is_empty() || !seen.insert(title_key.clone()) {
                return None;
            }

            Some(NewArticle {
                title,
                title_key,
                description: clean_text(item.description),
                content: clean_text(item.content),
                category: clean_text(item.category)
                    .map(|c| c.to_lowercase())
                    .unwrap_or_else(|| DEFAULT_ARTICLE_CATEGORY.to_string()),
                language: language.as_str().to_string(),
                source: clean_text(item.source).or_else(|| Some(DEFAULT_ARTICLE_SOURCE.to_string())),
                published_date: today,
                image_url: item
                    .image_url
                    .filter(|u| url::Url::parse(u).is_ok()),
            })
        })
        .collect()
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| clean_html(&v).trim().to_string())
        .filter(|v| !v.is_empty())
}
