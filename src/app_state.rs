use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::document_store::DocumentStore;
use crate::pipeline::Assistant;
use crate::retrieval::RetrievalEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub engine: Arc<RetrievalEngine>,
    pub assistant: Arc<dyn Assistant>,
    pub status: Arc<Mutex<Status>>,
}

/// Estado de la última tarea de fondo (siembra o recarga del índice).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        engine: Arc<RetrievalEngine>,
        assistant: Arc<dyn Assistant>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            assistant,
            status: Arc::new(Mutex::new(Status {
                is_busy: false,
                message: "Servidor listo.".to_string(),
                progress: 0.0,
            })),
        }
    }

    pub fn status_snapshot(&self) -> Status {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }
}
