// src/models/parent_override.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Represents the 'lesson_parent_overrides' table.
/// One row per (lesson, student), written with upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub lesson_id: i64,
    pub student_id: String,
    pub completed: bool,
    pub score_override: Option<f64>,
    pub attempts_override: Option<i64>,
    pub notes: Option<String>,
}

/// The parent controls form exactly as the page submits it: numeric
/// inputs arrive as text and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ParentOverrideForm {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub score: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub attempts: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub note: String,
}

impl ParentOverrideForm {
    /// What the revert button leaves in the form.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Seeds the form from a stored override.
    pub fn from_record(record: &OverrideRecord) -> Self {
        Self {
            completed: record.completed,
            score: record.score_override.map(|s| s.to_string()).unwrap_or_default(),
            attempts: record
                .attempts_override
                .map(|a| a.to_string())
                .unwrap_or_default(),
            note: record.notes.clone().unwrap_or_default(),
        }
    }

    /// Coerces the text fields: empty numeric inputs become null, as does
    /// an empty note. Text that is not a number is rejected.
    pub fn into_record(self, lesson_id: i64, student_id: &str) -> Result<OverrideRecord, AppError> {
        let score_override = match self.score.trim() {
            "" => None,
            text => match text.parse::<f64>() {
                Ok(score) if score.is_finite() => Some(score),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "score must be a number, got '{}'",
                        text
                    )));
                }
            },
        };

        let attempts_override = match self.attempts.trim() {
            "" => None,
            text => match text.parse::<i64>() {
                Ok(attempts) if attempts >= 0 => Some(attempts),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "attempts must be a whole number, got '{}'",
                        text
                    )));
                }
            },
        };

        let notes = if self.note.is_empty() { None } else { Some(self.note) };

        Ok(OverrideRecord {
            lesson_id,
            student_id: student_id.to_string(),
            completed: self.completed,
            score_override,
            attempts_override,
            notes,
        })
    }
}
