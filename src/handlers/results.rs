// src/handlers/results.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{error::AppError, services::results, store::ContentStore, utils::jwt::Claims};

/// Result and per-question review of a completed attempt.
pub async fn get_result(
    State(store): State<Arc<dyn ContentStore>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = results::load_result(store.as_ref(), claims.user_id()?, attempt_id).await?;
    Ok(Json(result))
}

/// The caller's completed attempts, newest first.
pub async fn list_attempts(
    State(store): State<Arc<dyn ContentStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let history = results::list_history(store.as_ref(), claims.user_id()?).await?;
    Ok(Json(history))
}
