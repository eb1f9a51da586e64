// src/models/article.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'articles' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: String,
    pub language: Option<String>,
    pub source: Option<String>,
    pub published_date: chrono::NaiveDate,
    pub image_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Insert payload produced by the generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    /// De-duplication key computed from the title; unique in the store.
    pub title_key: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: String,
    pub language: String,
    pub source: Option<String>,
    pub published_date: chrono::NaiveDate,
    pub image_url: Option<String>,
}

/// Query parameters for the article feed.
#[derive(Debug, Deserialize, Validate)]
pub struct ArticleListParams {
    pub language: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

/// Content language accepted by the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Hindi];

    /// Tag stored in `articles.language`.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
        }
    }

    /// Name used inside model prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
        }
    }
}

/// DTO for an admin-triggered news refresh.
#[derive(Debug, Default, Deserialize)]
pub struct FetchNewsRequest {
    #[serde(default)]
    pub language: Language,
}
