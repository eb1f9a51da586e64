// src/services/generation/news.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::GenerationError;
use crate::config::{GenerationConfig, NEWS_PAGE_SIZE};

/// One raw headline from the news provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source: Option<HeadlineSource>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadlineSource {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Headline>,
}

#[derive(Debug, Clone)]
pub struct NewsClient {
    http: Client,
    base_url: String,
    country: String,
    category: String,
}

impl NewsClient {
    pub fn new(http: Client, config: &GenerationConfig) -> Self {
        Self {
            http,
            base_url: config.news_api_base_url.trim_end_matches('/').to_string(),
            country: config.news_country.clone(),
            category: config.news_category.clone(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub async fn top_headlines(&self, api_key: &str) -> Result<Vec<Headline>, GenerationError> {
        let url = format!("{}/top-headlines", self.base_url);
        let page_size = NEWS_PAGE_SIZE.to_string();

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", api_key)
            .query(&[
                ("country", self.country.as_str()),
                ("category", self.category.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Upstream {
                service: "news provider",
                status: status.as_u16(),
            });
        }

        let body: HeadlinesResponse = response.json().await?;
        tracing::info!(count = body.articles.len(), "Fetched headlines");
        Ok(body.articles)
    }
}
