// src/handlers/sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::AnswerOption,
        test::{StartSessionRequest, TestRef},
    },
    services::session_manager::SessionManager,
    utils::jwt::Claims,
};

/// DTO for selecting an option. Accepts `a`-`d` in any case.
#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub option: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub index: i64,
}

/// Starts a timed session on a mock test or previous paper.
pub async fn start_session(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let view = sessions
        .start(user_id, TestRef { kind: req.kind, id: req.id })
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.view(claims.user_id()?, attempt_id).await?;
    Ok(Json(view))
}

pub async fn select_answer(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let option: AnswerOption = req.option.parse().map_err(AppError::BadRequest)?;
    let view = sessions
        .select_answer(claims.user_id()?, attempt_id, question_id, option)
        .await?;
    Ok(Json(view))
}

pub async fn clear_answer(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .clear_answer(claims.user_id()?, attempt_id, question_id)
        .await?;
    Ok(Json(view))
}

/// Flips the "marked for review" flag of a question.
pub async fn toggle_mark(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path((attempt_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .toggle_mark(claims.user_id()?, attempt_id, question_id)
        .await?;
    Ok(Json(view))
}

/// Moves to a question. Out-of-range indexes are clamped.
pub async fn navigate(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .navigate(claims.user_id()?, attempt_id, req.index)
        .await?;
    Ok(Json(view))
}

/// Grades and finalizes the attempt.
///
/// * 409 when the attempt was already submitted (second tab, countdown).
/// * 503 when storage failed; answers are kept and the call can be retried.
pub async fn submit_session(
    State(sessions): State<SessionManager>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sessions.submit(claims.user_id()?, attempt_id).await?;
    Ok(Json(attempt))
}
