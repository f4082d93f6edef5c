use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{debug, error, info, warn};

use crate::{
    app_state::{AppState, Status},
    error::StoreError,
    models::{Confidence, DocumentFilter, DocumentPatch, NewDocument, QueryResult},
    retrieval::EngineState,
};

const SERVICE_NAME: &str = "RailAdvice AI Backend";
const VERSION: &str = env!("CARGO_PKG_VERSION");

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (code, Json(json!({ "error": message.into() })))
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(id) => api_error(StatusCode::NOT_FOUND, format!("Documento no encontrado: {id}")),
        StoreError::EmptyContent => api_error(StatusCode::BAD_REQUEST, StoreError::EmptyContent.to_string()),
        other => {
            error!("Error del almacén de documentos: {other}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

// --- Payloads y respuestas ---

#[derive(Deserialize)]
pub struct ChatPayload {
    message: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    response: String,
    sources: usize,
    confidence: Confidence,
    intent_categories: Vec<String>,
    specific_terms: Vec<String>,
    analysis_summary: String,
}

impl From<QueryResult> for ChatResponse {
    fn from(result: QueryResult) -> Self {
        let sources = result.sources();
        let mut analysis_summary = format!("Processed with {} confidence", result.confidence);
        if sources > 0 {
            analysis_summary.push_str(&format!(" using {sources} sources"));
        }
        Self {
            response: result.answer,
            sources,
            confidence: result.confidence,
            intent_categories: result.intent_categories,
            specific_terms: result.specific_terms,
            analysis_summary,
        }
    }
}

#[derive(Serialize)]
pub struct AiStatus {
    #[serde(flatten)]
    status: Status,
    engine_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
    indexed_documents: usize,
    vector_backend: &'static str,
    embedder: String,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/greet", get(greet_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/ai-status", get(ai_status_handler))
        .route("/api/reload", post(reload_handler))
        .route("/api/documents", get(list_documents_handler).post(add_document_handler))
        .route(
            "/api/documents/:id",
            get(get_document_handler)
                .put(update_document_handler)
                .delete(delete_document_handler),
        )
        .with_state(app_state)
}

/// Lanza una recarga completa del índice en segundo plano, reflejando el
/// progreso en `Status`.
pub fn spawn_reload(state: AppState, reason: &'static str) {
    spawn(async move {
        {
            if let Ok(mut status) = state.status.lock() {
                status.is_busy = true;
                status.message = format!("Recargando el índice ({reason})...");
                status.progress = 0.0;
            }
        }

        let progress_status = state.status.clone();
        let result = state
            .engine
            .reload(state.store.as_ref(), move |done, total| {
                if let Ok(mut status) = progress_status.lock() {
                    status.message = format!("[{done}/{total}] Indexando documentos...");
                    status.progress = done as f32 / total.max(1) as f32;
                }
            })
            .await;

        if let Ok(mut status) = state.status.lock() {
            status.is_busy = false;
            status.progress = 0.0;
            match result {
                Ok(summary) => {
                    status.message = format!("¡Índice recargado! {summary}");
                }
                Err(err) => {
                    status.message = format!("Error recargando el índice: {err}");
                    error!("Error de recarga: {err}");
                }
            }
        }
    });
}

async fn document_count(state: &AppState) -> usize {
    state.store.count().await.unwrap_or_else(|e| {
        warn!("⚠️ No se pudo contar los documentos: {e}");
        0
    })
}

// --- Handlers ---

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "El mensaje no puede estar vacío."));
    }

    match state.engine.state().await {
        EngineState::Ready => {}
        EngineState::Loading => {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "El motor de IA todavía se está cargando.",
            ))
        }
        EngineState::Failed(reason) => {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("El motor de IA no está disponible: {reason}"),
            ))
        }
    }

    info!("Procesando consulta: {message}");
    if let Some(context) = &payload.context {
        debug!("Contexto de la consulta: {context}");
    }

    let assistant = state.assistant.clone();
    let task = spawn(async move { assistant.ask(&message).await });
    let timeout = Duration::from_secs(state.config.chat_timeout_secs);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(Json(ChatResponse::from(result))),
        Ok(Err(join_err)) => {
            error!("La tarea de consulta terminó con error: {join_err}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error procesando la pregunta.",
            ))
        }
        Err(_) => {
            warn!("⏱️ La consulta superó {}s", state.config.chat_timeout_secs);
            Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "El motor de IA todavía se está cargando. Inténtalo de nuevo en un momento.",
            ))
        }
    }
}

#[axum::debug_handler]
async fn list_documents_handler(
    State(state): State<AppState>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filtered = filter.query.is_some()
        || filter.doc_type.is_some()
        || filter.category.is_some()
        || filter.tag.is_some();

    let documents = if filtered {
        let found = state.store.search(&filter).await.map_err(store_error)?;
        serde_json::to_value(found)
    } else {
        let records = state.store.list(filter.limit).await.map_err(store_error)?;
        serde_json::to_value(records)
    };
    let documents =
        documents.map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let count = documents.as_array().map(Vec::len).unwrap_or_default();
    Ok(Json(json!({ "documents": documents, "count": count })))
}

#[axum::debug_handler]
async fn add_document_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "El título no puede estar vacío."));
    }
    let document = state.store.add(payload).await.map_err(store_error)?;
    spawn_reload(state, "documento añadido");
    Ok((StatusCode::CREATED, Json(document)))
}

#[axum::debug_handler]
async fn get_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.get(&id).await.map_err(store_error)? {
        Some(document) => Ok(Json(document)),
        None => Err(store_error(StoreError::NotFound(id))),
    }
}

#[axum::debug_handler]
async fn update_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<impl IntoResponse, ApiError> {
    if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(store_error(StoreError::EmptyContent));
    }
    let updated = state.store.update(&id, patch).await.map_err(store_error)?;
    match updated {
        Some(document) => {
            spawn_reload(state, "documento actualizado");
            Ok(Json(document))
        }
        None => Err(store_error(StoreError::NotFound(id))),
    }
}

#[axum::debug_handler]
async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.remove(&id).await.map_err(store_error)? {
        return Err(store_error(StoreError::NotFound(id)));
    }
    if let Err(e) = state.engine.forget(&id).await {
        warn!("⚠️ No se pudo retirar {id} del índice: {e}");
    }
    spawn_reload(state, "documento eliminado");
    Ok(Json(json!({ "deleted": id })))
}

#[axum::debug_handler]
async fn reload_handler(State(state): State<AppState>) -> impl IntoResponse {
    spawn_reload(state, "petición manual");
    StatusCode::ACCEPTED
}

#[axum::debug_handler]
async fn ai_status_handler(State(state): State<AppState>) -> Json<AiStatus> {
    let engine_state = state.engine.state().await;
    let failure_reason = match &engine_state {
        EngineState::Failed(reason) => Some(reason.clone()),
        _ => None,
    };
    Json(AiStatus {
        status: state.status_snapshot(),
        engine_state: engine_state.as_str(),
        failure_reason,
        indexed_documents: state.engine.indexed_count().await,
        vector_backend: state.engine.backend(),
        embedder: state.engine.embedder_name(),
    })
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store_ok = state.store.count().await;
    let engine_state = state.engine.state().await;

    let status = match (&store_ok, &engine_state) {
        (Ok(_), EngineState::Ready) => "healthy",
        (Ok(_), EngineState::Loading) => "loading",
        _ => "partial",
    };

    Json(json!({
        "status": status,
        "doc_manager_loaded": store_ok.is_ok(),
        "ai_engine_loaded": engine_state == EngineState::Ready,
        "engine_state": engine_state.as_str(),
        "documents_count": store_ok.unwrap_or_default(),
        "service": SERVICE_NAME,
        "version": VERSION,
    }))
}

#[axum::debug_handler]
async fn greet_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let doc_count = document_count(&state).await;
    Json(json!({
        "greeting": format!(
            "Hei! Jeg er RailAdvice AI-assistenten din med tilgang til {doc_count} dokumenter. \
             Jeg kan hjelpe deg med ETCS, jernbaneteknologi og RailAdvice sine prosjekter."
        )
    }))
}

#[axum::debug_handler]
async fn stats_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.store.stats().await.map_err(store_error)?;
    let engine_state = state.engine.state().await;
    Ok(Json(json!({
        "total_documents": stats.total_documents,
        "document_types": stats.document_types,
        "categories": stats.categories,
        "ai_engine": {
            "loaded": engine_state == EngineState::Ready,
            "state": engine_state.as_str(),
            "documents_in_ai": state.engine.indexed_count().await,
            "vector_backend": state.engine.backend(),
        },
    })))
}

#[axum::debug_handler]
async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let doc_count = document_count(&state).await;
    Json(json!({
        "message": "RailAdvice AI Backend API",
        "version": VERSION,
        "status": "running",
        "ai_loaded": state.engine.is_ready().await,
        "documents": doc_count,
        "endpoints": {
            "health": "/api/health",
            "chat": "/api/chat",
            "greet": "/api/greet",
            "stats": "/api/stats",
            "ai_status": "/api/ai-status",
            "documents": "/api/documents",
            "reload": "/api/reload",
        }
    }))
}
