// src/models/mod.rs

pub mod answer;
pub mod attempt;
pub mod auth;
pub mod lesson;
pub mod parent_override;
pub mod profile;
pub mod retake;
pub mod week;
