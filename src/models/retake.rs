// src/models/retake.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Represents the 'retake_grants' table.
/// A grant is consumed by flipping `used` to true, exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetakeGrant {
    pub id: i64,
    pub user_id: String,
    pub lesson_id: i64,
    pub used: bool,
}

/// Insert shape for a new grant.
#[derive(Debug, Clone, Serialize)]
pub struct NewRetakeGrant {
    pub user_id: String,
    pub lesson_id: i64,
    pub used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetakeStatus {
    pub can_retake: bool,
}

#[derive(Debug, Deserialize)]
pub struct RetakeParams {
    pub user_id: Option<String>,
}

/// DTO for a parent granting a retake to a child.
#[derive(Debug, Deserialize, Validate)]
pub struct GrantRetakeRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}
