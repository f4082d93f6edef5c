//! Proveedores de embeddings.
//!
//! - [`LocalEmbedder`]: hashing de tokens en un vector de dimensión fija. No
//!   necesita red ni modelos y es determinista; el cálculo se hace en un hilo
//!   de `spawn_blocking` para no bloquear el runtime.
//! - [`OpenAiEmbedder`]: modelo de embeddings de OpenAI a través de Rig.

use async_trait::async_trait;
use tracing::debug;

use crate::error::EmbeddingError;

/// Convierte texto en vectores de longitud fija.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding de un único texto.
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError>;

    /// Embeddings en bloque. Por defecto llama a [`embed`](Self::embed) en
    /// secuencia.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize;

    /// Nombre legible del modelo, para diagnósticos.
    fn name(&self) -> String;
}

// ---------------------------------------------------------------------
// LOCAL
// ---------------------------------------------------------------------

/// Embedder por "feature hashing": cada token (y cada bigrama de tokens)
/// suma ±1 en una posición derivada de su hash FNV-1a. El vector resultante
/// se normaliza (L2), así que la similitud coseno mide solapamiento léxico.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    /// Versión síncrona, usada dentro de `spawn_blocking`.
    pub fn embed_sync(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0f64; self.dimensions];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f64], feature: &[u8], weight: f64) {
        let hash = fnv1a(feature);
        let slot = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let embedder = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_sync(&text))
            .await
            .map_err(|e| EmbeddingError::Provider {
                provider: "local".to_string(),
                message: e.to_string(),
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> String {
        format!("local-hash-{}", self.dimensions)
    }
}

/// Tokens en minúsculas, separados por cualquier carácter no alfanumérico.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(PRIME))
}

// ---------------------------------------------------------------------
// OPENAI (Rig)
// ---------------------------------------------------------------------

/// Embeddings de OpenAI vía Rig. Requiere `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
        }
    }

    fn model_name(&self) -> &str {
        use rig::providers::openai::TEXT_EMBEDDING_3_SMALL;
        if self.model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.model.as_str()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        use rig::client::EmbeddingsClient as _;
        use rig::embeddings::EmbeddingModel as _;
        use rig::providers::openai;

        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let client = openai::Client::from_env();
        let embedding_model = client.embedding_model(self.model_name());

        debug!("Pidiendo {} embeddings a OpenAI ({})", texts.len(), self.model_name());
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| EmbeddingError::Provider {
                provider: "openai".to_string(),
                message: e.to_string(),
            })?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> String {
        format!("openai/{}", self.model_name())
    }
}
