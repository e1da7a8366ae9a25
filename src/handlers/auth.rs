// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::auth::{EmailCodeRequest, LoginRequest},
    services::LessonsClient,
    sync::AutosaveController,
};

/// Requests a passwordless sign-in code for the given email.
pub async fn request_email_code(
    State(client): State<Arc<LessonsClient>>,
    Json(payload): Json<EmailCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    client.sign_in_with_email_code(&payload.email).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Check your email for the sign-in link" })),
    ))
}

/// Signs in with email and password.
/// The session is kept by the front-end process; only the user is returned.
pub async fn login(
    State(client): State<Arc<LessonsClient>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = client
        .sign_in_with_password(&payload.email, &payload.password)
        .await?;

    Ok(Json(json!({ "user": session.user })))
}

/// Signs out after flushing pending answer saves, so they still go out
/// under the current user. Bound lessons must be bound again afterwards.
pub async fn logout(
    State(client): State<Arc<LessonsClient>>,
    State(autosave): State<Arc<AutosaveController>>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(e) = autosave.unbind_all().await {
        tracing::warn!("Pending answers could not be flushed before sign-out: {}", e);
    }

    client.sign_out().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Current user and profile; `null` when nobody is signed in.
pub async fn me(State(client): State<Arc<LessonsClient>>) -> Result<impl IntoResponse, AppError> {
    let ctx = client.current_user_with_profile().await?;
    Ok(Json(ctx))
}
