// src/services/retakes.rs

use serde_json::json;

use super::{ATTEMPTS, LessonsClient, RETAKE_GRANTS};
use crate::{
    backend::{Filter, Query, from_rows, to_row},
    error::AppError,
    models::retake::{NewRetakeGrant, RetakeGrant, RetakeStatus},
};

impl LessonsClient {
    /// A retake is possible once the lesson has a submitted attempt and at
    /// least one unused grant exists.
    pub async fn get_retake_status(&self, user_id: &str, lesson_id: i64) -> Result<RetakeStatus, AppError> {
        let grants = Query::new()
            .eq("user_id", user_id)
            .eq("lesson_id", lesson_id)
            .eq("used", false);
        let attempts = Query::new()
            .eq("user_id", user_id)
            .eq("lesson_id", lesson_id)
            .filter(Filter::not_null("submitted_at"));

        let (grants, attempts) = tokio::try_join!(
            self.backend.tables.select(RETAKE_GRANTS, &grants),
            self.backend.tables.select(ATTEMPTS, &attempts),
        )?;

        Ok(RetakeStatus {
            can_retake: !attempts.is_empty() && !grants.is_empty(),
        })
    }

    /// Consumes one unused grant. Returns whether a grant was consumed.
    ///
    /// The flip is conditional on `used = false`, so two sessions racing
    /// for the same grant cannot both win; the loser reports `false`
    /// without trying another grant.
    pub async fn use_one_retake(&self, user_id: &str, lesson_id: i64) -> Result<bool, AppError> {
        let query = Query::new()
            .eq("user_id", user_id)
            .eq("lesson_id", lesson_id)
            .eq("used", false)
            .limit(1);

        let candidates = match self.backend.tables.select(RETAKE_GRANTS, &query).await {
            Ok(rows) => from_rows::<RetakeGrant>(rows)?,
            Err(e) => {
                tracing::warn!("Retake lookup failed for lesson {}: {}", lesson_id, e);
                return Ok(false);
            }
        };
        let Some(grant) = candidates.into_iter().next() else {
            return Ok(false);
        };

        let patch = to_row(&json!({ "used": true }))?;
        let filters = [Filter::eq("id", grant.id), Filter::eq("used", false)];
        match self.backend.tables.update(RETAKE_GRANTS, patch, &filters).await {
            Ok(affected) => Ok(!affected.is_empty()),
            Err(e) => {
                tracing::warn!("Retake grant {} could not be consumed: {}", grant.id, e);
                Ok(false)
            }
        }
    }

    /// A parent allows one more attempt at a lesson.
    pub async fn grant_retake(&self, kid_user_id: &str, lesson_id: i64) -> Result<(), AppError> {
        let grant = NewRetakeGrant {
            user_id: kid_user_id.to_string(),
            lesson_id,
            used: false,
        };
        self.backend
            .tables
            .insert(RETAKE_GRANTS, vec![to_row(&grant)?])
            .await?;
        tracing::info!("Retake granted to {} for lesson {}", kid_user_id, lesson_id);
        Ok(())
    }
}
