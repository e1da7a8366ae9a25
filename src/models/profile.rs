// src/models/profile.rs

use serde::{Deserialize, Serialize};

use crate::backend::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
}

/// Represents the 'profiles' table, one row per signed-up user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

/// The signed-in user together with their profile, if one exists.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithProfile {
    pub user: Identity,
    pub profile: Option<Profile>,
}
