// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    config::{LLM_API_KEY_SETTING, NEWS_API_KEY_SETTING},
    error::AppError,
    models::{
        article::FetchNewsRequest,
        setting::{AdminSetting, PutSettingRequest},
        test::GenerateTestRequest,
    },
    services::generation::GenerationService,
    store::ContentStore,
    utils::jwt::Claims,
};

/// Setting keys the admin console may write.
const KNOWN_SETTINGS: [&str; 2] = [NEWS_API_KEY_SETTING, LLM_API_KEY_SETTING];

/// Fetches headlines and stores summarized articles.
/// Admin only.
pub async fn fetch_news(
    State(generation): State<Arc<GenerationService>>,
    Json(req): Json<FetchNewsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let count = generation.fetch_and_summarize_news(req.language).await?;

    Ok(Json(json!({
        "success": true,
        "articlesCount": count,
    })))
}

/// Generates a mock test with the language model.
/// Admin only.
pub async fn generate_test(
    State(generation): State<Arc<GenerationService>>,
    Json(req): Json<GenerateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    if req.subject.trim().is_empty() {
        return Err(AppError::BadRequest("Subject is required".to_string()));
    }

    let test = generation.generate_test(&req).await?;

    Ok(Json(json!({
        "success": true,
        "testId": test.id,
        "testTitle": test.name,
        "questionsCount": test.questions_count,
    })))
}

/// Lists provider settings with their values masked.
/// Admin only.
pub async fn list_settings(
    State(store): State<Arc<dyn ContentStore>>,
) -> Result<impl IntoResponse, AppError> {
    let settings: Vec<AdminSetting> = store
        .list_settings()
        .await?
        .iter()
        .map(AdminSetting::masked)
        .collect();

    Ok(Json(settings))
}

/// Stores a provider key.
/// Admin only.
pub async fn put_setting(
    State(store): State<Arc<dyn ContentStore>>,
    Extension(claims): Extension<Claims>,
    Path(key): Path<String>,
    Json(req): Json<PutSettingRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    if !KNOWN_SETTINGS.contains(&key.as_str()) {
        return Err(AppError::BadRequest(format!("Unknown setting '{key}'")));
    }

    let setting = store
        .put_setting(&key, req.value.trim(), claims.user_id()?)
        .await?;
    tracing::info!(key = %key, updated_by = %claims.sub, "Admin setting updated");

    Ok(Json(setting.masked()))
}
