// src/handlers/retakes.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::retake::{GrantRetakeRequest, RetakeParams},
    services::LessonsClient,
};

async fn signed_in_id(client: &LessonsClient) -> Result<String, AppError> {
    client
        .current_user_with_profile()
        .await?
        .map(|ctx| ctx.user.id)
        .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))
}

/// Whether `user_id` (default: the signed-in user) may retake the lesson.
pub async fn get_retake_status(
    State(client): State<Arc<LessonsClient>>,
    Path(lesson_id): Path<i64>,
    Query(params): Query<RetakeParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = match params.user_id {
        Some(user_id) => user_id,
        None => signed_in_id(&client).await?,
    };

    Ok(Json(client.get_retake_status(&user_id, lesson_id).await?))
}

/// Consumes one of the signed-in user's grants for the lesson.
pub async fn use_one_retake(
    State(client): State<Arc<LessonsClient>>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = signed_in_id(&client).await?;

    if !client.use_one_retake(&user_id, lesson_id).await? {
        return Err(AppError::Conflict("No retake available".to_string()));
    }
    Ok(Json(json!({ "used": true })))
}

/// Parent only.
pub async fn grant_retake(
    State(client): State<Arc<LessonsClient>>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<GrantRetakeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    client.require_parent().await?;

    client.grant_retake(&payload.user_id, lesson_id).await?;
    Ok(StatusCode::CREATED)
}
