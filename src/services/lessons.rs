// src/services/lessons.rs

use chrono::{NaiveDate, Utc};

use super::{LESSONS, LessonsClient, PROFILES, WEEKS};
use crate::{
    backend::{Filter, Query, from_rows, maybe_single},
    error::AppError,
    models::{
        lesson::Lesson,
        profile::{Profile, Role},
        week::Week,
    },
};

pub const DEFAULT_WEEK_LIMIT: usize = 12;

impl LessonsClient {
    /// The week whose date range contains today (UTC).
    pub async fn get_active_week(&self) -> Result<Option<Week>, AppError> {
        self.get_active_week_on(Utc::now().date_naive()).await
    }

    pub async fn get_active_week_on(&self, day: NaiveDate) -> Result<Option<Week>, AppError> {
        let day = day.format("%Y-%m-%d").to_string();
        let query = Query::new()
            .filter(Filter::lte("start_date", day.as_str()))
            .filter(Filter::gte("end_date", day.as_str()));

        let rows = self.backend.tables.select(WEEKS, &query).await?;
        maybe_single(rows)
    }

    /// Most recent weeks first.
    pub async fn list_weeks(&self, limit: Option<usize>) -> Result<Vec<Week>, AppError> {
        let query = Query::new()
            .order_by("start_date", false)
            .limit(limit.unwrap_or(DEFAULT_WEEK_LIMIT));

        from_rows(self.backend.tables.select(WEEKS, &query).await?)
    }

    /// Lessons of a week as the signed-in user should see them: students
    /// only get the ones assigned to them, parents get everything. Without
    /// a user or profile the list is empty.
    pub async fn list_lessons_for_current_user(&self, week_id: i64) -> Result<Vec<Lesson>, AppError> {
        let Some(ctx) = self.current_user_with_profile().await? else {
            return Ok(Vec::new());
        };
        let Some(profile) = ctx.profile else {
            return Ok(Vec::new());
        };

        let mut query = Query::new().eq("week_id", week_id);
        if profile.role == Role::Student {
            query = query.eq("for_user", ctx.user.id.as_str());
        }
        let query = query.order_by("id", true);

        from_rows(self.backend.tables.select(LESSONS, &query).await?)
    }

    /// Every lesson of a week, grouped by student.
    pub async fn list_all_lessons(&self, week_id: i64) -> Result<Vec<Lesson>, AppError> {
        let query = Query::new()
            .eq("week_id", week_id)
            .order_by("for_user", true)
            .order_by("id", true);

        from_rows(self.backend.tables.select(LESSONS, &query).await?)
    }

    pub async fn list_students(&self) -> Result<Vec<Profile>, AppError> {
        let query = Query::new().eq("role", "student");
        from_rows(self.backend.tables.select(PROFILES, &query).await?)
    }
}
