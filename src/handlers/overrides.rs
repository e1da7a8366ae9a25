// src/handlers/overrides.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::parent_override::ParentOverrideForm,
    services::LessonsClient,
};

/// Current override (if any) and the form seeded from it.
pub async fn get_override(
    State(client): State<Arc<LessonsClient>>,
    Path((lesson_id, student_id)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    client.require_parent().await?;

    let record = client.get_override(lesson_id, &student_id).await?;
    let form = record
        .as_ref()
        .map(ParentOverrideForm::from_record)
        .unwrap_or_else(ParentOverrideForm::cleared);

    Ok(Json(json!({
        "override": record,
        "form": form,
    })))
}

/// Save button of the parent controls.
pub async fn save_override(
    State(client): State<Arc<LessonsClient>>,
    Path((lesson_id, student_id)): Path<(i64, String)>,
    Json(form): Json<ParentOverrideForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()?;
    client.require_parent().await?;

    let saved = client.save_override(lesson_id, &student_id, form).await?;

    Ok(Json(json!({
        "override": saved,
        "source": "Parent override",
    })))
}
