// src/handlers/attempts.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{
        AttemptListParams, LessonAttemptParams, RecordAttemptRequest, StartAttemptRequest,
        SubmitAttemptRequest,
    },
    services::LessonsClient,
};

/// Opens an attempt at a lesson or test for the signed-in user.
pub async fn start_attempt(
    State(client): State<Arc<LessonsClient>>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = payload.target.content()?;
    let attempt = client.start_attempt(content).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn submit_attempt(
    State(client): State<Arc<LessonsClient>>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let attempt = client
        .submit_attempt(attempt_id, payload.score, payload.detail)
        .await?;
    Ok(Json(attempt))
}

/// Records a finished attempt in one step for the signed-in user.
pub async fn record_attempt(
    State(client): State<Arc<LessonsClient>>,
    Json(payload): Json<RecordAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = payload.target.content()?;

    let user = client
        .current_user_with_profile()
        .await?
        .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))?;

    let attempt = client
        .record_attempt(content, &user.user.id, payload.score)
        .await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn list_attempts_for_user(
    State(client): State<Arc<LessonsClient>>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = client
        .list_attempts_for_user(params.user_id.as_deref(), params.week_id)
        .await?;
    Ok(Json(attempts))
}

pub async fn list_attempts_for_lessons(
    State(client): State<Arc<LessonsClient>>,
    Query(params): Query<LessonAttemptParams>,
) -> Result<impl IntoResponse, AppError> {
    let lesson_ids = params.lesson_ids()?;
    Ok(Json(client.list_attempts_for_lessons(&lesson_ids).await?))
}
