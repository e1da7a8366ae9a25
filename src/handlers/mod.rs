// src/handlers/mod.rs

pub mod answers;
pub mod attempts;
pub mod auth;
pub mod lessons;
pub mod overrides;
pub mod retakes;
