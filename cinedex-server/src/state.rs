use std::sync::Arc;

use cinedex_core::{
    FilmCache, RecoveryDriver, SearchStore, SourceRegistry, TaskSupervisor,
};

/// Everything the handlers need, shared by cheap clone.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: TaskSupervisor,
    pub recovery: Arc<RecoveryDriver>,
    pub sources: Arc<dyn SourceRegistry>,
    pub cache: Arc<dyn FilmCache>,
    pub search: Arc<dyn SearchStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
