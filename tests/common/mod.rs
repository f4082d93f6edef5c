#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use railadvice_assistant::config::{AppConfig, EmbeddingBackend, RankingConfig, VectorBackend};
use railadvice_assistant::document_store::{DocumentStore, FileDocumentStore};
use railadvice_assistant::embedding::{EmbeddingProvider, LocalEmbedder};
use railadvice_assistant::error::EmbeddingError;
use railadvice_assistant::models::{Document, NewDocument};
use railadvice_assistant::retrieval::RetrievalEngine;
use railadvice_assistant::vector_store::InMemoryVectorIndex;

pub const DIMENSIONS: usize = 256;

/// Embedder local que puede forzarse a fallar.
pub struct SwitchableEmbedder {
    inner: LocalEmbedder,
    pub failing: AtomicBool,
}

impl SwitchableEmbedder {
    pub fn new() -> Self {
        Self {
            inner: LocalEmbedder::new(DIMENSIONS),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for SwitchableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Provider {
                provider: "test".to_string(),
                message: "modelo caído".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> String {
        "switchable".to_string()
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<FileDocumentStore>,
    pub embedder: Arc<SwitchableEmbedder>,
    pub engine: Arc<RetrievalEngine>,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FileDocumentStore::open(dir.path().join("documents")).await.expect("store"));
        let embedder = Arc::new(SwitchableEmbedder::new());
        let engine = Arc::new(RetrievalEngine::new(
            embedder.clone(),
            Arc::new(InMemoryVectorIndex::new(DIMENSIONS)),
            RankingConfig::default(),
        ));
        Self {
            dir,
            store,
            embedder,
            engine,
        }
    }

    pub async fn add(&self, title: &str, category: &str, content: &str) -> Document {
        self.store
            .add(NewDocument {
                title: title.to_string(),
                content: content.to_string(),
                doc_type: "technical".to_string(),
                category: category.to_string(),
                tags: Vec::new(),
                metadata: Default::default(),
            })
            .await
            .expect("add")
    }

    pub async fn reload(&self) {
        self.engine
            .reload(self.store.as_ref(), |_, _| {})
            .await
            .expect("reload");
    }

    pub fn store_dyn(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            data_dir: self.dir.path().join("documents"),
            memory_file: self.dir.path().join("conversation_memory.json"),
            enable_memory: false,
            chat_timeout_secs: 5,
            embedding_backend: EmbeddingBackend::Local,
            llm_embedding_model: "local".to_string(),
            embedding_dimensions: DIMENSIONS,
            vector_backend: VectorBackend::Memory,
            neo4j: None,
            ranking: RankingConfig::default(),
            seed_sources: Vec::new(),
        }
    }
}

pub const ETCS_DOC: &str = "ETCS Level 2 er et signalsystem der toget mottar kjøretillatelser over radio. \
    RBC sender bevegelsesmyndighet til toget og overvåker hastigheten kontinuerlig. \
    Systemet erstatter lyssignaler langs sporet på strekninger med full utbygging.";

pub const DEPOT_DOC: &str = "Verkstedet på Lodalen ble modernisert med nye løfteanlegg for togsett. \
    Prosjektet omfattet også nye spor inn mot hallen og bedre ventilasjon. \
    Arbeidet ble gjennomført uten stans i driften av vedlikeholdet.";
