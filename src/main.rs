use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use railadvice_assistant::{
    api,
    app_state::AppState,
    config::{AppConfig, EmbeddingBackend, VectorBackend},
    document_store::{DocumentStore, FileDocumentStore},
    embedding::{EmbeddingProvider, LocalEmbedder, OpenAiEmbedder},
    ingest,
    memory::{ConversationMemory, ConversationalAssistant},
    neo4j_client,
    pipeline::{Assistant, QaPipeline},
    retrieval::RetrievalEngine,
    vector_store::{InMemoryVectorIndex, VectorIndex},
};

fn build_embedder(cfg: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    match cfg.embedding_backend {
        EmbeddingBackend::Local => Arc::new(LocalEmbedder::new(cfg.embedding_dimensions)),
        EmbeddingBackend::OpenAI => Arc::new(OpenAiEmbedder::new(
            cfg.llm_embedding_model.clone(),
            cfg.embedding_dimensions,
        )),
    }
}

async fn build_index(cfg: &AppConfig) -> Result<Arc<dyn VectorIndex>> {
    match (&cfg.vector_backend, &cfg.neo4j) {
        (VectorBackend::Neo4j, Some(neo4j)) => {
            let graph = neo4j_client::connect_from_config(neo4j)
                .await
                .context("Error conectando a Neo4j")?;
            neo4j_client::ensure_schema(&graph, cfg.embedding_dimensions)
                .await
                .context("Error asegurando el esquema de Neo4j")?;
            Ok(Arc::new(neo4j_client::Neo4jVectorIndex::new(Arc::new(graph))))
        }
        _ => Ok(Arc::new(InMemoryVectorIndex::new(cfg.embedding_dimensions))),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("No se pudo escuchar Ctrl-C: {e}");
    }
    info!("Señal de apagado recibida, iniciando cierre del servidor.");
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Almacén de documentos y siembra de documentos externos
    let store: Arc<dyn DocumentStore> = Arc::new(
        FileDocumentStore::open(&cfg.data_dir)
            .await
            .context("Error abriendo el almacén de documentos")?,
    );

    // 4. Motor de recuperación (embeddings + índice vectorial)
    let embedder = build_embedder(&cfg);
    let index = build_index(&cfg).await?;
    info!(
        "🧠 Embeddings: {} ({} dimensiones), índice: {}",
        embedder.name(),
        embedder.dimensions(),
        index.backend()
    );
    let engine = Arc::new(RetrievalEngine::new(embedder, index, cfg.ranking.clone()));

    // 5. Pipeline, con memoria conversacional opcional
    let pipeline = QaPipeline::new(engine.clone(), store.clone());
    let assistant: Arc<dyn Assistant> = if cfg.enable_memory {
        let memory = ConversationMemory::load(&cfg.memory_file);
        info!(
            "💬 Memoria conversacional en {} ({} turnos)",
            memory.path().display(),
            memory.turns().len()
        );
        Arc::new(ConversationalAssistant::new(pipeline, memory))
    } else {
        Arc::new(pipeline)
    };

    let app_state = AppState::new(cfg.clone(), store.clone(), engine, assistant);

    // 6. Siembra + primera carga del índice en segundo plano
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            match ingest::seed_sources(state.store.as_ref(), &state.config.seed_sources, state.status.clone()).await {
                Ok(summary) => info!("📂 Siembra completada. {summary}"),
                Err(e) => warn!("⚠️ La siembra de documentos externos falló: {e:#}"),
            }
            api::spawn_reload(state, "arranque");
        });
    }

    // 7. Router de la API
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 8. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
