// src/models/auth.rs

use serde::Deserialize;
use validator::Validate;

/// DTO for requesting a passwordless sign-in code.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailCodeRequest {
    #[validate(email)]
    pub email: String,
}

/// DTO for email + password sign-in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
