// src/services/auth.rs

use super::{LessonsClient, PROFILES};
use crate::{
    backend::{Query, Session, maybe_single},
    error::AppError,
    models::profile::{Profile, Role, UserWithProfile},
};

impl LessonsClient {
    /// Sends a sign-in code to `email`; the link brings the user back to
    /// the configured front-end address.
    pub async fn sign_in_with_email_code(&self, email: &str) -> Result<(), AppError> {
        self.backend
            .auth
            .sign_in_with_email_code(email, &self.settings.email_redirect_to)
            .await
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        self.backend
            .auth
            .sign_in_with_password(email, password)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid login credentials".to_string()))
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.backend.auth.sign_out().await
    }

    /// The signed-in user and their profile. Nobody signed in is `None`;
    /// a user without a profile row gets `profile: None`.
    pub async fn current_user_with_profile(&self) -> Result<Option<UserWithProfile>, AppError> {
        let Some(user) = self.backend.auth.current_user().await? else {
            return Ok(None);
        };

        let rows = self
            .backend
            .tables
            .select(PROFILES, &Query::new().eq("user_id", user.id.as_str()))
            .await?;
        let profile = maybe_single::<Profile>(rows)?;

        Ok(Some(UserWithProfile { user, profile }))
    }

    /// Parent-only actions (overrides, retake grants) go through this.
    pub async fn require_parent(&self) -> Result<UserWithProfile, AppError> {
        let ctx = self
            .current_user_with_profile()
            .await?
            .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))?;

        let is_parent = matches!(&ctx.profile, Some(profile) if profile.role == Role::Parent);
        if !is_parent {
            return Err(AppError::Forbidden("Parent access required".to_string()));
        }
        Ok(ctx)
    }
}
