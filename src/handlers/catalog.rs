// src/handlers/catalog.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{article::ArticleListParams, test::TestKind},
    store::ContentStore,
};

const DEFAULT_ARTICLE_LIMIT: i64 = 20;

pub async fn list_categories(
    State(store): State<Arc<dyn ContentStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_exam_categories().await?))
}

/// Mock tests, newest first.
pub async fn list_tests(
    State(store): State<Arc<dyn ContentStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_tests(TestKind::Test).await?))
}

/// Previous-year papers, newest first.
pub async fn list_papers(
    State(store): State<Arc<dyn ContentStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_tests(TestKind::Paper).await?))
}

/// News feed produced by the generation pipeline.
pub async fn list_articles(
    State(store): State<Arc<dyn ContentStore>>,
    Query(params): Query<ArticleListParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let limit = params.limit.unwrap_or(DEFAULT_ARTICLE_LIMIT);
    let articles = store
        .list_articles(params.language.as_deref(), limit)
        .await?;

    Ok(Json(articles))
}
