// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{
        generation::{GenerationError, GenerationService},
        session_manager::SessionManager,
    },
    store::ContentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub sessions: SessionManager,
    pub generation: Arc<GenerationService>,
    pub config: Config,
}

impl AppState {
    /// Wires the services around one store.
    pub fn new(store: Arc<dyn ContentStore>, config: Config) -> Result<Self, GenerationError> {
        let generation = GenerationService::new(Arc::clone(&store), config.generation.clone())?;
        Ok(Self {
            sessions: SessionManager::new(Arc::clone(&store)),
            generation: Arc::new(generation),
            store,
            config,
        })
    }
}

impl FromRef<AppState> for Arc<dyn ContentStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.store)
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<GenerationService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.generation)
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
