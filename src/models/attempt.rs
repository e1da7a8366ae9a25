// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::AppError;

/// What an attempt is an attempt at. Exactly one kind of content, so an
/// attempt can never point at both a lesson and a test, or at neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    Lesson(i64),
    Test(i64),
}

impl ContentRef {
    pub fn lesson_id(&self) -> Option<i64> {
        match self {
            ContentRef::Lesson(id) => Some(*id),
            ContentRef::Test(_) => None,
        }
    }

    pub fn test_id(&self) -> Option<i64> {
        match self {
            ContentRef::Test(id) => Some(*id),
            ContentRef::Lesson(_) => None,
        }
    }

    pub fn from_columns(lesson_id: Option<i64>, test_id: Option<i64>) -> Result<Self, String> {
        match (lesson_id, test_id) {
            (Some(id), None) => Ok(ContentRef::Lesson(id)),
            (None, Some(id)) => Ok(ContentRef::Test(id)),
            (Some(_), Some(_)) => Err("attempt references both a lesson and a test".to_string()),
            (None, None) => Err("attempt references neither a lesson nor a test".to_string()),
        }
    }
}

/// Raw shape of the 'attempts' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRow {
    id: i64,
    user_id: String,
    #[serde(default)]
    lesson_id: Option<i64>,
    #[serde(default)]
    test_id: Option<i64>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    detail: Option<Value>,
}

/// Represents one row of the 'attempts' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttemptRow", into = "AttemptRow")]
pub struct Attempt {
    pub id: i64,
    pub user_id: String,
    pub content: ContentRef,

    /// `None` until the attempt is submitted in the start/submit flow.
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub detail: Option<Value>,
}

impl Attempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = String;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            content: ContentRef::from_columns(row.lesson_id, row.test_id)?,
            score: row.score,
            submitted_at: row.submitted_at,
            detail: row.detail,
        })
    }
}

impl From<Attempt> for AttemptRow {
    fn from(attempt: Attempt) -> Self {
        Self {
            id: attempt.id,
            user_id: attempt.user_id,
            lesson_id: attempt.content.lesson_id(),
            test_id: attempt.content.test_id(),
            score: attempt.score,
            submitted_at: attempt.submitted_at,
            detail: attempt.detail,
        }
    }
}

/// Insert shape for a new attempt.
#[derive(Debug, Clone, Serialize)]
pub struct NewAttempt {
    pub user_id: String,
    pub lesson_id: Option<i64>,
    pub test_id: Option<i64>,
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl NewAttempt {
    pub fn new(user_id: &str, content: ContentRef) -> Self {
        Self {
            user_id: user_id.to_string(),
            lesson_id: content.lesson_id(),
            test_id: content.test_id(),
            score: None,
            submitted_at: None,
        }
    }
}

/// Update applied when an attempt is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSubmission {
    pub submitted_at: DateTime<Utc>,
    pub score: f64,
    pub detail: Option<Value>,
}

/// `lesson_id` or `test_id` as sent by the page.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentTarget {
    pub lesson_id: Option<i64>,
    pub test_id: Option<i64>,
}

impl ContentTarget {
    pub fn content(&self) -> Result<ContentRef, AppError> {
        ContentRef::from_columns(self.lesson_id, self.test_id).map_err(AppError::BadRequest)
    }
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    #[serde(flatten)]
    pub target: ContentTarget,
}

/// DTO for submitting a started attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(range(min = 0.0))]
    pub score: f64,
    pub detail: Option<Value>,
}

/// DTO for the single-shot "record my score" flow.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordAttemptRequest {
    #[serde(flatten)]
    pub target: ContentTarget,
    #[validate(range(min = 0.0))]
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub user_id: Option<String>,
    pub week_id: Option<i64>,
}

/// `?ids=1,2,3`
#[derive(Debug, Deserialize)]
pub struct LessonAttemptParams {
    #[serde(default)]
    pub ids: String,
}

impl LessonAttemptParams {
    pub fn lesson_ids(&self) -> Result<Vec<i64>, AppError> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| AppError::BadRequest(format!("invalid lesson id '{}'", s)))
            })
            .collect()
    }
}
