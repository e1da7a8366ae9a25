// src/models/answer.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::sync::FieldPhase;

/// DTO sent when a lesson page renders its answer fields.
#[derive(Debug, Deserialize, Validate)]
pub struct BindAnswersRequest {
    #[validate(length(min = 1, max = 500))]
    pub question_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BindAnswersResponse {
    pub lesson_id: String,
    pub remote_sync: bool,
    /// Initial value per question id.
    pub answers: BTreeMap<String, String>,
}

/// DTO for an input event on one answer field.
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerEditRequest {
    #[validate(length(max = 20000))]
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldStateResponse {
    pub question_id: String,
    pub phase: FieldPhase,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlushResponse {
    pub flushed: usize,
}
