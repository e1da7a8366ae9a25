// src/sync/autosave.rs

//! Debounced autosave of free-text answers.
//!
//! Each bound field has its own timer slot. Input and focus-loss events
//! restart that slot's countdown; when it fires, the field's value at that
//! moment is persisted through the `AnswerStore`. Fields never wait on
//! each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::debounce::ScheduledTask;
use super::reconciler::AnswerStore;
use super::record::AnswerScope;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub scope: AnswerScope,
    pub question_id: String,
}

impl FieldKey {
    pub fn new(scope: AnswerScope, question_id: impl Into<String>) -> Self {
        Self {
            scope,
            question_id: question_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPhase {
    Idle,
    Dirty,
}

#[derive(Default)]
struct FieldSlot {
    value: String,
    dirty: bool,
    /// Bumped on every event; a finished save only returns the field to
    /// `Idle` if no event arrived while it ran.
    generation: u64,
    timer: ScheduledTask,
}

pub struct AutosaveController {
    store: Arc<AnswerStore>,
    quiet: Duration,
    fields: Mutex<HashMap<FieldKey, FieldSlot>>,
    /// Scope of the most recent bind per lesson/test.
    scopes: Mutex<HashMap<String, AnswerScope>>,
}

impl AutosaveController {
    pub fn new(store: Arc<AnswerStore>, quiet: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            quiet,
            fields: Mutex::new(HashMap::new()),
            scopes: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    /// Binds the given questions of one lesson/test and returns the value
    /// each field should show.
    ///
    /// Without a subject (nobody signed in) the fields work in local-only
    /// mode. A field that is already bound and still has unsaved edits keeps
    /// its in-memory value.
    pub async fn bind(
        self: &Arc<Self>,
        question_ids: &[String],
        content_id: &str,
        subject_id: Option<&str>,
    ) -> BTreeMap<String, String> {
        let scope = AnswerScope::new(content_id, subject_id.map(str::to_string));
        let mut initial = self.store.load(&scope, question_ids).await;

        self.scopes
            .lock()
            .await
            .insert(content_id.to_string(), scope.clone());

        let mut fields = self.fields.lock().await;
        for (question_id, value) in initial.iter_mut() {
            let slot = fields
                .entry(FieldKey::new(scope.clone(), question_id.clone()))
                .or_default();
            if slot.dirty {
                value.clone_from(&slot.value);
            } else {
                slot.value.clone_from(value);
            }
        }

        tracing::info!(
            "Attached {} inputs for lesson '{}'. Remote sync: {}",
            initial.len(),
            content_id,
            if self.store.syncs_remotely(&scope) { "on" } else { "off" }
        );
        initial
    }

    /// Scope the lesson/test was last bound with.
    pub async fn scope_for(&self, content_id: &str) -> Option<AnswerScope> {
        self.scopes.lock().await.get(content_id).cloned()
    }

    /// Input event: record the new value and restart the field's countdown.
    pub async fn edit(self: &Arc<Self>, key: FieldKey, value: String) {
        let mut fields = self.fields.lock().await;
        let slot = fields.entry(key.clone()).or_default();
        slot.value = value;
        self.arm(key, slot);
    }

    /// Focus-loss event: restart the countdown with the current value, so a
    /// save is never deferred indefinitely.
    pub async fn blur(self: &Arc<Self>, key: FieldKey) {
        let mut fields = self.fields.lock().await;
        if let Some(slot) = fields.get_mut(&key) {
            self.arm(key, slot);
        }
    }

    fn arm(self: &Arc<Self>, key: FieldKey, slot: &mut FieldSlot) {
        slot.dirty = true;
        slot.generation += 1;

        let controller = Arc::clone(self);
        slot.timer.reschedule(self.quiet, async move {
            if let Err(e) = controller.save(&key).await {
                tracing::warn!("Autosave failed for {}: {}", key.question_id, e);
            }
        });
    }

    /// Persists the field's current value.
    async fn save(&self, key: &FieldKey) -> Result<(), AppError> {
        let (value, generation) = {
            let fields = self.fields.lock().await;
            match fields.get(key) {
                Some(slot) => (slot.value.clone(), slot.generation),
                None => return Ok(()),
            }
        };

        let result = self
            .store
            .persist(&key.scope, &key.question_id, &value)
            .await;

        let mut fields = self.fields.lock().await;
        if let Some(slot) = fields.get_mut(key) {
            if slot.generation == generation && result.is_ok() {
                slot.dirty = false;
            }
        }
        result.map(|_| ())
    }

    /// Saves the field now if a countdown is pending. Returns whether a
    /// save ran.
    pub async fn flush(&self, key: &FieldKey) -> Result<bool, AppError> {
        let pending = {
            let mut fields = self.fields.lock().await;
            match fields.get_mut(key) {
                Some(slot) => slot.timer.cancel(),
                None => false,
            }
        };

        if pending {
            self.save(key).await?;
        }
        Ok(pending)
    }

    /// Flushes every pending field of one lesson/test (page unload) and
    /// releases its idle slots.
    pub async fn flush_scope(&self, scope: &AnswerScope) -> Result<usize, AppError> {
        let keys: Vec<FieldKey> = {
            let fields = self.fields.lock().await;
            fields.keys().filter(|k| &k.scope == scope).cloned().collect()
        };
        let flushed = self.flush_keys(keys).await?;

        self.fields
            .lock()
            .await
            .retain(|key, slot| &key.scope != scope || slot.dirty);
        Ok(flushed)
    }

    pub async fn flush_all(&self) -> Result<usize, AppError> {
        let keys: Vec<FieldKey> = self.fields.lock().await.keys().cloned().collect();
        self.flush_keys(keys).await
    }

    /// Sign-out: saves what is pending, then forgets every binding so no
    /// later event is attributed to the previous user. Events for a lesson
    /// are refused until it is bound again.
    pub async fn unbind_all(&self) -> Result<usize, AppError> {
        let flushed = self.flush_all().await;

        self.scopes.lock().await.clear();
        // A slot that is still dirty belongs to a save already running;
        // it finishes under the scope it started with.
        self.fields.lock().await.retain(|_, slot| slot.dirty);

        flushed
    }

    /// Number of field slots held in memory.
    pub async fn tracked_fields(&self) -> usize {
        self.fields.lock().await.len()
    }

    async fn flush_keys(&self, keys: Vec<FieldKey>) -> Result<usize, AppError> {
        let mut flushed = 0;
        for key in keys {
            if self.flush(&key).await? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    pub async fn phase(&self, key: &FieldKey) -> FieldPhase {
        match self.fields.lock().await.get(key) {
            Some(slot) if slot.dirty => FieldPhase::Dirty,
            _ => FieldPhase::Idle,
        }
    }

    pub async fn value(&self, key: &FieldKey) -> Option<String> {
        self.fields.lock().await.get(key).map(|slot| slot.value.clone())
    }
}
