// src/services/overrides.rs

use std::collections::HashSet;
use std::sync::Mutex;

use super::{LessonsClient, OVERRIDES};
use crate::{
    backend::{Query, from_row, maybe_single, to_row},
    error::AppError,
    models::parent_override::{OverrideRecord, ParentOverrideForm},
};

const OVERRIDE_CONFLICT: [&str; 2] = ["lesson_id", "student_id"];

/// Marks one (lesson, student) save as in flight until dropped.
struct SaveGuard<'a> {
    in_flight: &'a Mutex<HashSet<(i64, String)>>,
    key: (i64, String),
}

impl<'a> SaveGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<(i64, String)>>, key: (i64, String)) -> Option<Self> {
        let mut saves = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !saves.insert(key.clone()) {
            return None;
        }
        Some(Self { in_flight, key })
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        let mut saves = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        saves.remove(&self.key);
    }
}

impl LessonsClient {
    /// Creates or replaces the parent override for (lesson, student).
    ///
    /// A second save for the same pair while one is in flight is refused,
    /// like a disabled save button. Provider errors come back verbatim and
    /// release the pair so the parent can retry.
    pub async fn save_override(
        &self,
        lesson_id: i64,
        student_id: &str,
        form: ParentOverrideForm,
    ) -> Result<OverrideRecord, AppError> {
        let record = form.into_record(lesson_id, student_id)?;

        let _guard = SaveGuard::acquire(&self.override_saves, (lesson_id, student_id.to_string()))
            .ok_or_else(|| AppError::Conflict("Saving… please wait".to_string()))?;

        let mut rows = self
            .backend
            .tables
            .upsert(OVERRIDES, vec![to_row(&record)?], &OVERRIDE_CONFLICT)
            .await
            .map_err(|e| {
                tracing::error!("Override save failed for lesson {}: {}", lesson_id, e);
                e
            })?;

        if rows.is_empty() {
            return Err(AppError::Backend("upsert returned no override".to_string()));
        }
        let saved: OverrideRecord = from_row(rows.remove(0))?;
        tracing::info!("Parent override saved for lesson {} / {}", lesson_id, student_id);
        Ok(saved)
    }

    pub async fn get_override(
        &self,
        lesson_id: i64,
        student_id: &str,
    ) -> Result<Option<OverrideRecord>, AppError> {
        let query = Query::new()
            .eq("lesson_id", lesson_id)
            .eq("student_id", student_id);
        maybe_single(self.backend.tables.select(OVERRIDES, &query).await?)
    }

    pub fn override_save_in_flight(&self, lesson_id: i64, student_id: &str) -> bool {
        self.override_saves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(lesson_id, student_id.to_string()))
    }
}
