use crate::catalog::CatalogSource;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogSource>,
    pub started_at: Instant,
    pub registry: Registry,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogSource>, registry: Registry) -> Self {
        Self {
            catalog,
            started_at: Instant::now(),
            registry,
        }
    }
}
