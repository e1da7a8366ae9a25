// src/handlers/lessons.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{lesson::ContentParams, week::WeekListParams},
    services::LessonsClient,
};

/// The week covering today, or `null`.
pub async fn get_active_week(
    State(client): State<Arc<LessonsClient>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(client.get_active_week().await?))
}

pub async fn list_weeks(
    State(client): State<Arc<LessonsClient>>,
    Query(params): Query<WeekListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.map(|l| l.clamp(1, 100));
    Ok(Json(client.list_weeks(limit).await?))
}

/// Lessons of a week for whoever is signed in.
pub async fn list_lessons(
    State(client): State<Arc<LessonsClient>>,
    Path(week_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(client.list_lessons_for_current_user(week_id).await?))
}

pub async fn list_all_lessons(
    State(client): State<Arc<LessonsClient>>,
    Path(week_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(client.list_all_lessons(week_id).await?))
}

pub async fn list_students(
    State(client): State<Arc<LessonsClient>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(client.list_students().await?))
}

/// Raw text of a stored lesson body (rendered by the page).
pub async fn get_content(
    State(client): State<Arc<LessonsClient>>,
    Query(params): Query<ContentParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.path.trim().is_empty() || params.path.contains("..") {
        return Err(AppError::BadRequest("invalid content path".to_string()));
    }
    client.fetch_signed_text(&params.path).await
}
