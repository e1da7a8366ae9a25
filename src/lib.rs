// src/lib.rs

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod sync;

// Re-export specific items for convenience if needed
pub use routes::create_router;
