use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::{
    backend::Backend,
    cache::LocalCache,
    config::Config,
    error::AppError,
    services::{ClientSettings, LessonsClient},
    sync::{AnswerStore, AutosaveController},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub client: Arc<LessonsClient>,
    pub autosave: Arc<AutosaveController>,
}

impl AppState {
    /// Composition root: wires one backend handle and one local cache into
    /// the lessons client and the autosave controller.
    pub fn build(
        config: Config,
        backend: Backend,
        cache: Arc<dyn LocalCache>,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let store = AnswerStore::new(cache, Some(backend.tables.clone()));
        let autosave = AutosaveController::new(Arc::new(store), config.autosave_debounce);
        let client = LessonsClient::new(backend, http, ClientSettings::from(&config));

        Ok(Self {
            config,
            client: Arc::new(client),
            autosave,
        })
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<LessonsClient> {
    fn from_ref(state: &AppState) -> Self {
        state.client.clone()
    }
}

impl FromRef<AppState> for Arc<AutosaveController> {
    fn from_ref(state: &AppState) -> Self {
        state.autosave.clone()
    }
}
