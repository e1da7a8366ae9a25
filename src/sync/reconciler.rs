// src/sync/reconciler.rs

//! Last-write-wins reconciliation between the device-local copy of an
//! answer and the copy stored in the backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{self, AnswerScope, StampedValue};
use crate::{
    backend::{Query, TableService, from_rows, to_row},
    cache::LocalCache,
    error::AppError,
};

pub const RESPONSES_TABLE: &str = "lesson_responses";
const RESPONSES_CONFLICT: [&str; 3] = ["user_id", "lesson_id", "question_id"];

/// Row shape of the remote answers table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonResponse {
    pub user_id: String,
    pub lesson_id: String,
    pub question_id: String,
    pub answer: String,
    pub updated_at: DateTime<Utc>,
}

/// Picks the authoritative copy: the strictly newer one, local on ties.
pub fn pick<'a>(
    local: Option<&'a StampedValue>,
    remote: Option<&'a StampedValue>,
) -> Option<&'a StampedValue> {
    match (local, remote) {
        (Some(l), Some(r)) if r.updated_at > l.updated_at => Some(r),
        (Some(l), _) => Some(l),
        (None, r) => r,
    }
}

/// The value to display for a question; empty when neither copy exists.
pub fn resolve(local: Option<&StampedValue>, remote: Option<&StampedValue>) -> String {
    pick(local, remote)
        .map(|answer| answer.value.clone())
        .unwrap_or_default()
}

/// Reads and writes both copies of answers.
///
/// The remote side is only used for scopes with a subject and only when a
/// table service was provided. Remote failures are logged and swallowed:
/// the local copy is always what the user sees.
pub struct AnswerStore {
    cache: Arc<dyn LocalCache>,
    remote: Option<Arc<dyn TableService>>,
}

impl AnswerStore {
    pub fn new(cache: Arc<dyn LocalCache>, remote: Option<Arc<dyn TableService>>) -> Self {
        Self { cache, remote }
    }

    pub fn local_only(cache: Arc<dyn LocalCache>) -> Self {
        Self::new(cache, None)
    }

    fn remote_for<'a>(&'a self, scope: &'a AnswerScope) -> Option<(&'a dyn TableService, &'a str)> {
        match (&self.remote, &scope.subject_id) {
            (Some(remote), Some(subject)) => Some((remote.as_ref(), subject.as_str())),
            _ => None,
        }
    }

    pub fn syncs_remotely(&self, scope: &AnswerScope) -> bool {
        self.remote_for(scope).is_some()
    }

    /// Local copy of one answer. Unreadable or undecodable entries count
    /// as absent.
    pub async fn load_local(&self, scope: &AnswerScope, question_id: &str) -> Option<StampedValue> {
        let key = scope.cache_key(question_id);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Local answer read failed for {}: {}", key, e);
                return None;
            }
        };

        match record::decode(&raw) {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!("Ignoring local answer {}: {}", key, e);
                None
            }
        }
    }

    /// All remote answers for the scope, keyed by question.
    pub async fn load_remote(&self, scope: &AnswerScope) -> HashMap<String, StampedValue> {
        let Some((remote, subject)) = self.remote_for(scope) else {
            return HashMap::new();
        };

        let query = Query::new()
            .eq("user_id", subject)
            .eq("lesson_id", scope.content_id.as_str());

        let rows = match remote.select(RESPONSES_TABLE, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Remote answer load failed for {}: {}", scope.content_id, e);
                return HashMap::new();
            }
        };

        match from_rows::<LessonResponse>(rows) {
            Ok(responses) => responses
                .into_iter()
                .map(|r| (r.question_id, StampedValue::new(r.answer, r.updated_at)))
                .collect(),
            Err(e) => {
                tracing::warn!("Remote answers for {} are unreadable: {}", scope.content_id, e);
                HashMap::new()
            }
        }
    }

    /// Resolves the displayed value of every question. Local copies and the
    /// remote batch are fetched concurrently.
    pub async fn load(
        &self,
        scope: &AnswerScope,
        question_ids: &[String],
    ) -> BTreeMap<String, String> {
        let locals = async {
            let mut locals = HashMap::with_capacity(question_ids.len());
            for question_id in question_ids {
                if let Some(answer) = self.load_local(scope, question_id).await {
                    locals.insert(question_id.clone(), answer);
                }
            }
            locals
        };
        let (locals, remotes) = tokio::join!(locals, self.load_remote(scope));

        question_ids
            .iter()
            .map(|qid| (qid.clone(), resolve(locals.get(qid), remotes.get(qid))))
            .collect()
    }

    async fn write_local(
        &self,
        scope: &AnswerScope,
        question_id: &str,
        answer: &StampedValue,
    ) -> Result<(), AppError> {
        let encoded = record::encode(answer)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        self.cache.set(&scope.cache_key(question_id), &encoded).await
    }

    /// Writes `value` locally, then tries the backend.
    ///
    /// Returns the timestamp the local copy ends up with. Only a local
    /// write failure is an error.
    pub async fn persist(
        &self,
        scope: &AnswerScope,
        question_id: &str,
        value: &str,
    ) -> Result<DateTime<Utc>, AppError> {
        let previous = self.load_local(scope, question_id).await;
        let mut stamped_at = Utc::now();
        if let Some(previous) = &previous {
            stamped_at = stamped_at.max(previous.updated_at);
        }

        let local = StampedValue::new(value, stamped_at);
        self.write_local(scope, question_id, &local).await?;

        let Some((remote, subject)) = self.remote_for(scope) else {
            return Ok(stamped_at);
        };

        let response = LessonResponse {
            user_id: subject.to_string(),
            lesson_id: scope.content_id.clone(),
            question_id: question_id.to_string(),
            answer: value.to_string(),
            updated_at: stamped_at,
        };
        let upserted = match to_row(&response) {
            Ok(row) => {
                remote
                    .upsert(RESPONSES_TABLE, vec![row], &RESPONSES_CONFLICT)
                    .await
            }
            Err(e) => Err(e),
        };

        let confirmed = match upserted {
            Ok(rows) => from_rows::<LessonResponse>(rows)
                .ok()
                .and_then(|rows| rows.into_iter().next())
                .map(|row| row.updated_at)
                .unwrap_or(stamped_at),
            Err(e) => {
                tracing::warn!(
                    "Remote answer save failed for {}/{}: {}",
                    scope.content_id,
                    question_id,
                    e
                );
                return Ok(stamped_at);
            }
        };

        // Re-stamp only if no newer edit replaced what we just wrote.
        match self.load_local(scope, question_id).await {
            Some(current) if current.value == value && current.updated_at <= confirmed => {
                let agreed = StampedValue::new(value, confirmed);
                if let Err(e) = self.write_local(scope, question_id, &agreed).await {
                    tracing::warn!("Could not re-stamp local answer {}: {}", question_id, e);
                    return Ok(current.updated_at);
                }
                tracing::debug!("Answer {} synced at {}", question_id, confirmed);
                Ok(confirmed)
            }
            Some(current) => Ok(current.updated_at),
            None => Ok(stamped_at),
        }
    }
}
