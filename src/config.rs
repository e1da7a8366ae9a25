// src/config.rs

use std::env;
use std::time::Duration;
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the hosted backend gateway. `None` runs the front-end against
    /// the in-process backend (offline mode).
    pub backend_url: Option<String>,
    pub backend_anon_key: String,
    pub cache_database_url: String,
    pub listen_addr: String,
    pub autosave_debounce: Duration,
    pub signed_url_ttl: Duration,
    pub content_bucket: String,
    pub email_redirect_to: String,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_anon_key: String::new(),
            cache_database_url: "sqlite://lessons-cache.db?mode=rwc".to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            autosave_debounce: Duration::from_millis(400),
            signed_url_ttl: Duration::from_secs(120),
            content_bucket: "content".to_string(),
            email_redirect_to: "http://127.0.0.1:3000/".to_string(),
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = Self::default();

        let backend_url = env::var("BACKEND_URL").ok().filter(|v| !v.trim().is_empty());

        let backend_anon_key = match &backend_url {
            Some(_) => env::var("BACKEND_ANON_KEY")
                .expect("BACKEND_ANON_KEY must be set when BACKEND_URL is set"),
            None => String::new(),
        };

        let cache_database_url =
            env::var("CACHE_DATABASE_URL").unwrap_or(defaults.cache_database_url);

        let listen_addr = env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr);

        let autosave_debounce = env::var("AUTOSAVE_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.autosave_debounce);

        let signed_url_ttl = env::var("SIGNED_URL_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.signed_url_ttl);

        let content_bucket = env::var("CONTENT_BUCKET").unwrap_or(defaults.content_bucket);

        let email_redirect_to =
            env::var("EMAIL_REDIRECT_TO").unwrap_or(defaults.email_redirect_to);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            backend_url,
            backend_anon_key,
            cache_database_url,
            listen_addr,
            autosave_debounce,
            signed_url_ttl,
            content_bucket,
            email_redirect_to,
            rust_log,
        }
    }
}
