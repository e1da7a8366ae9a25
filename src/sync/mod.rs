// src/sync/mod.rs

pub mod autosave;
pub mod debounce;
pub mod reconciler;
pub mod record;

pub use autosave::{AutosaveController, FieldKey, FieldPhase};
pub use debounce::ScheduledTask;
pub use reconciler::{AnswerStore, resolve};
pub use record::{AnswerScope, StampedValue};
