//! Carga y gestión de configuración de la aplicación (almacén, embeddings,
//! índice vectorial y umbrales de ranking).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// Proveedor de embeddings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Embedder local por hashing de tokens, sin red.
    Local,
    OpenAI,
}

impl EmbeddingBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "hash" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Proveedor de embeddings no soportado: {other}")),
        }
    }
}

/// Backend del índice vectorial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VectorBackend {
    Memory,
    Neo4j,
}

impl VectorBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "neo4j" => Ok(Self::Neo4j),
            other => Err(anyhow!("Backend vectorial no soportado: {other}")),
        }
    }
}

/// Credenciales de Neo4j; sólo obligatorias con `VECTOR_BACKEND=neo4j`.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Pesos y umbrales del re-ranking. Son empíricos y dependen del modelo de
/// embeddings, por eso se leen del entorno.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingConfig {
    /// Candidatos pedidos al índice (K ≥ 2).
    pub top_k: usize,
    /// Documentos que pasan al generador de respuestas.
    pub answer_documents: usize,
    pub title_bonus: f64,
    pub category_bonus: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            answer_documents: 2,
            title_bonus: 0.4,
            category_bonus: 0.2,
            high_threshold: 1.0,
            medium_threshold: 0.7,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k < 2 {
            bail!("RETRIEVAL_TOP_K debe ser al menos 2 (recibido {})", self.top_k);
        }
        if self.answer_documents == 0 {
            bail!("ANSWER_DOCUMENTS debe ser mayor que 0");
        }
        if self.medium_threshold > self.high_threshold {
            bail!(
                "MEDIUM_CONFIDENCE ({}) no puede superar HIGH_CONFIDENCE ({})",
                self.medium_threshold,
                self.high_threshold
            );
        }
        Ok(())
    }
}

/// Directorio de documentos externos a sembrar al arrancar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSource {
    pub dir: PathBuf,
    pub doc_type: String,
    pub category: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub data_dir: PathBuf,
    pub memory_file: PathBuf,
    pub enable_memory: bool,
    pub chat_timeout_secs: u64,

    pub embedding_backend: EmbeddingBackend,
    pub llm_embedding_model: String,
    pub embedding_dimensions: usize,

    pub vector_backend: VectorBackend,
    pub neo4j: Option<Neo4jConfig>,

    pub ranking: RankingConfig,
    pub seed_sources: Vec<SeedSource>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./documents".to_string()));
        let memory_file = PathBuf::from(
            env::var("MEMORY_FILE").unwrap_or_else(|_| "conversation_memory.json".to_string()),
        );
        let enable_memory = parse_var("ENABLE_MEMORY", true)?;
        let chat_timeout_secs = parse_var("CHAT_TIMEOUT_SECS", 30)?;

        let embedding_backend =
            EmbeddingBackend::from_str(&env::var("EMBEDDING_PROVIDER").unwrap_or_else(|_| "local".to_string()))?;
        if embedding_backend == EmbeddingBackend::OpenAI && env::var("OPENAI_API_KEY").is_err() {
            bail!("EMBEDDING_PROVIDER=openai requiere OPENAI_API_KEY en el entorno");
        }
        let llm_embedding_model = env::var("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let default_dims = match embedding_backend {
            EmbeddingBackend::Local => 384,
            EmbeddingBackend::OpenAI => 1536,
        };
        let embedding_dimensions = parse_var("EMBEDDING_DIMENSIONS", default_dims)?;

        let vector_backend =
            VectorBackend::from_str(&env::var("VECTOR_BACKEND").unwrap_or_else(|_| "memory".to_string()))?;
        let neo4j = match vector_backend {
            VectorBackend::Memory => None,
            VectorBackend::Neo4j => Some(Neo4jConfig {
                uri: env::var("NEO4J_URI").map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?,
                user: env::var("NEO4J_USER").map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?,
                password: env::var("NEO4J_PASSWORD")
                    .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            }),
        };

        let defaults = RankingConfig::default();
        let ranking = RankingConfig {
            top_k: parse_var("RETRIEVAL_TOP_K", defaults.top_k)?,
            answer_documents: parse_var("ANSWER_DOCUMENTS", defaults.answer_documents)?,
            title_bonus: parse_var("TITLE_BONUS", defaults.title_bonus)?,
            category_bonus: parse_var("CATEGORY_BONUS", defaults.category_bonus)?,
            high_threshold: parse_var("HIGH_CONFIDENCE", defaults.high_threshold)?,
            medium_threshold: parse_var("MEDIUM_CONFIDENCE", defaults.medium_threshold)?,
        };
        ranking.validate()?;

        let seed_sources = seed_sources_from_env();

        Ok(Self {
            server_addr,
            data_dir,
            memory_file,
            enable_memory,
            chat_timeout_secs,
            embedding_backend,
            llm_embedding_model,
            embedding_dimensions,
            vector_backend,
            neo4j,
            ranking,
            seed_sources,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido en {name}: '{raw}'")),
        _ => Ok(default),
    }
}

fn seed_sources_from_env() -> Vec<SeedSource> {
    let specs = [
        ("SEED_PROJECTS_DIR", "./projects", "project", "projects"),
        ("SEED_REGULATIONS_DIR", "./regulations", "regulation", "regulations"),
        ("SEED_CONTENT_DIR", "", "content_guide", "railadvice_guides"),
    ];

    specs
        .iter()
        .filter_map(|(var, default, doc_type, category)| {
            let dir = env::var(var).unwrap_or_else(|_| default.to_string());
            if dir.trim().is_empty() {
                return None;
            }
            Some(SeedSource {
                dir: PathBuf::from(dir),
                doc_type: doc_type.to_string(),
                category: category.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_parse_case_insensitive() {
        assert_eq!(EmbeddingBackend::from_str("OpenAI").unwrap(), EmbeddingBackend::OpenAI);
        assert_eq!(EmbeddingBackend::from_str("hash").unwrap(), EmbeddingBackend::Local);
        assert_eq!(VectorBackend::from_str("NEO4J").unwrap(), VectorBackend::Neo4j);
        assert!(VectorBackend::from_str("chroma").is_err());
    }

    #[test]
    fn ranking_validation_rejects_small_k_and_inverted_thresholds() {
        let mut cfg = RankingConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.top_k = 1;
        assert!(cfg.validate().is_err());

        let cfg = RankingConfig {
            medium_threshold: 1.5,
            ..RankingConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
