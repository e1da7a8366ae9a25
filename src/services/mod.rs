// src/services/mod.rs

//! Typed client over the hosted backend: everything the lesson pages ask
//! of it besides answer autosave.

pub mod attempts;
pub mod auth;
pub mod content;
pub mod lessons;
pub mod overrides;
pub mod retakes;

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::Backend;
use crate::config::Config;

pub const WEEKS: &str = "weeks";
pub const LESSONS: &str = "lessons";
pub const PROFILES: &str = "profiles";
pub const ATTEMPTS: &str = "attempts";
pub const RETAKE_GRANTS: &str = "retake_grants";
pub const OVERRIDES: &str = "lesson_parent_overrides";

/// Settings the client needs from `Config`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub email_redirect_to: String,
    pub content_bucket: String,
    pub signed_url_ttl: Duration,
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            email_redirect_to: config.email_redirect_to.clone(),
            content_bucket: config.content_bucket.clone(),
            signed_url_ttl: config.signed_url_ttl,
        }
    }
}

pub struct LessonsClient {
    backend: Backend,
    http: reqwest::Client,
    settings: ClientSettings,
    /// (lesson, student) pairs with an override save in flight.
    override_saves: Mutex<HashSet<(i64, String)>>,
}

impl LessonsClient {
    pub fn new(backend: Backend, http: reqwest::Client, settings: ClientSettings) -> Self {
        Self {
            backend,
            http,
            settings,
            override_saves: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}
