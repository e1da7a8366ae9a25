// src/handlers/answers.rs

//! Event endpoints for the answer fields of a lesson page: the page binds
//! its fields once, then forwards every input and focus-loss event.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::answer::{
        AnswerEditRequest, BindAnswersRequest, BindAnswersResponse, FieldStateResponse,
        FlushResponse,
    },
    services::LessonsClient,
    sync::{AnswerScope, AutosaveController, FieldKey},
};

async fn bound_scope(
    autosave: &AutosaveController,
    lesson_id: &str,
) -> Result<AnswerScope, AppError> {
    autosave.scope_for(lesson_id).await.ok_or_else(|| {
        AppError::BadRequest(format!("Answers for lesson '{}' are not bound", lesson_id))
    })
}

/// Binds the page's answer fields and returns their initial values.
/// Signed-in users get remote sync; everyone else stays local-only.
pub async fn bind_answers(
    State(client): State<Arc<LessonsClient>>,
    State(autosave): State<Arc<AutosaveController>>,
    Path(lesson_id): Path<String>,
    Json(payload): Json<BindAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subject = match client.backend().auth.current_user().await {
        Ok(user) => user.map(|u| u.id),
        Err(e) => {
            tracing::warn!("Auth lookup failed, binding answers local-only: {}", e);
            None
        }
    };

    let answers = autosave
        .bind(&payload.question_ids, &lesson_id, subject.as_deref())
        .await;
    let scope = AnswerScope::new(lesson_id.clone(), subject);

    Ok(Json(BindAnswersResponse {
        remote_sync: autosave.store().syncs_remotely(&scope),
        lesson_id,
        answers,
    }))
}

/// Input event.
pub async fn edit_answer(
    State(autosave): State<Arc<AutosaveController>>,
    Path((lesson_id, question_id)): Path<(String, String)>,
    Json(payload): Json<AnswerEditRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let scope = bound_scope(&autosave, &lesson_id).await?;
    let key = FieldKey::new(scope, question_id.clone());
    autosave.edit(key.clone(), payload.value).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(FieldStateResponse {
            phase: autosave.phase(&key).await,
            question_id,
        }),
    ))
}

/// Focus-loss event.
pub async fn blur_answer(
    State(autosave): State<Arc<AutosaveController>>,
    Path((lesson_id, question_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let scope = bound_scope(&autosave, &lesson_id).await?;
    let key = FieldKey::new(scope, question_id.clone());
    autosave.blur(key.clone()).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(FieldStateResponse {
            phase: autosave.phase(&key).await,
            question_id,
        }),
    ))
}

/// Page is going away: save whatever is still waiting for its countdown.
pub async fn flush_answers(
    State(autosave): State<Arc<AutosaveController>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let scope = bound_scope(&autosave, &lesson_id).await?;
    let flushed = autosave.flush_scope(&scope).await?;
    Ok(Json(FlushResponse { flushed }))
}
