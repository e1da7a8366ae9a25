// src/services/attempts.rs

use chrono::Utc;
use serde_json::Value;

use super::{ATTEMPTS, LESSONS, LessonsClient};
use crate::{
    backend::{Filter, Query, from_row, from_rows, to_row},
    error::AppError,
    models::{
        attempt::{Attempt, AttemptSubmission, ContentRef, NewAttempt},
        lesson::Lesson,
    },
};

impl LessonsClient {
    async fn signed_in_user_id(&self) -> Result<String, AppError> {
        self.backend
            .auth
            .current_user()
            .await?
            .map(|user| user.id)
            .ok_or_else(|| AppError::AuthError("Not signed in".to_string()))
    }

    async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<Attempt, AppError> {
        let mut rows = self
            .backend
            .tables
            .insert(ATTEMPTS, vec![to_row(attempt)?])
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert attempt: {}", e);
                e
            })?;

        if rows.is_empty() {
            return Err(AppError::Backend("insert returned no attempt".to_string()));
        }
        from_row(rows.remove(0))
    }

    /// Opens an attempt for the signed-in user; it stays unsubmitted until
    /// `submit_attempt`.
    pub async fn start_attempt(&self, content: ContentRef) -> Result<Attempt, AppError> {
        let user_id = self.signed_in_user_id().await?;
        self.insert_attempt(&NewAttempt::new(&user_id, content)).await
    }

    /// Stamps `submitted_at` and stores the score. Submitting twice is
    /// rejected: submitted attempts are never changed again.
    pub async fn submit_attempt(
        &self,
        attempt_id: i64,
        score: f64,
        detail: Option<Value>,
    ) -> Result<Attempt, AppError> {
        let submission = AttemptSubmission {
            submitted_at: Utc::now(),
            score,
            detail,
        };
        let filters = [Filter::eq("id", attempt_id), Filter::is_null("submitted_at")];

        let mut rows = self
            .backend
            .tables
            .update(ATTEMPTS, to_row(&submission)?, &filters)
            .await?;

        match rows.len() {
            0 => Err(AppError::NotFound(format!(
                "No open attempt with id {}",
                attempt_id
            ))),
            _ => from_row(rows.remove(0)),
        }
    }

    /// Single-shot flow: one insert with the score and submission time.
    pub async fn record_attempt(
        &self,
        content: ContentRef,
        user_id: &str,
        score: f64,
    ) -> Result<Attempt, AppError> {
        let attempt = NewAttempt {
            score: Some(score),
            submitted_at: Some(Utc::now()),
            ..NewAttempt::new(user_id, content)
        };
        self.insert_attempt(&attempt).await
    }

    pub async fn list_attempts_for_lessons(&self, lesson_ids: &[i64]) -> Result<Vec<Attempt>, AppError> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().filter(Filter::is_in("lesson_id", lesson_ids.iter().copied()));
        from_rows(self.backend.tables.select(ATTEMPTS, &query).await?)
    }

    /// Attempts, optionally narrowed to one user and to the lessons of one
    /// week.
    pub async fn list_attempts_for_user(
        &self,
        user_id: Option<&str>,
        week_id: Option<i64>,
    ) -> Result<Vec<Attempt>, AppError> {
        let mut query = Query::new();
        if let Some(user_id) = user_id {
            query = query.eq("user_id", user_id);
        }

        if let Some(week_id) = week_id {
            let lessons: Vec<Lesson> = from_rows(
                self.backend
                    .tables
                    .select(LESSONS, &Query::new().eq("week_id", week_id))
                    .await?,
            )?;
            if lessons.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(Filter::is_in("lesson_id", lessons.iter().map(|l| l.id)));
        }

        from_rows(self.backend.tables.select(ATTEMPTS, &query).await?)
    }
}
