//! Índice vectorial: contrato común y backend en memoria.
//!
//! API pública:
//!   - `VectorIndex` (trait): `clear`, `upsert`, `remove`, `query`, `len`.
//!   - `InMemoryVectorIndex`: búsqueda exacta por fuerza bruta con distancia
//!     coseno (`1 - cos`).
//!
//! El backend Neo4j vive en `neo4j_client`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::IndexError;
use crate::models::{IndexMatch, IndexedEntry};

/// Almacén de triples (vector, texto, metadatos) con consulta de vecinos.
///
/// Las consultas pueden ejecutarse en paralelo; `clear` + recarga completa
/// se serializa desde el motor de recuperación.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Vacía el índice.
    async fn clear(&self) -> Result<(), IndexError>;

    /// Inserta o reemplaza la entrada del documento `entry.metadata.doc_id`.
    async fn upsert(&self, entry: IndexedEntry) -> Result<(), IndexError>;

    /// Elimina la entrada de un documento. Devuelve si existía.
    async fn remove(&self, doc_id: &str) -> Result<bool, IndexError>;

    /// Los `top_k` vecinos más cercanos, ordenados por distancia ascendente.
    async fn query(&self, vector: &[f64], top_k: usize) -> Result<Vec<IndexMatch>, IndexError>;

    fn backend(&self) -> &'static str;
}

/// Índice en memoria protegido por un `RwLock` de tokio.
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    entries: RwLock<HashMap<String, IndexedEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), IndexError> {
        if actual != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }
        Ok(())
    }
}

/// Similitud coseno; 0.0 si alguno de los vectores es nulo.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn clear(&self) -> Result<(), IndexError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn upsert(&self, entry: IndexedEntry) -> Result<(), IndexError> {
        self.check_dimensions(entry.vector.len())?;
        let mut entries = self.entries.write().await;
        entries.insert(entry.metadata.doc_id.clone(), entry);
        Ok(())
    }

    async fn remove(&self, doc_id: &str) -> Result<bool, IndexError> {
        Ok(self.entries.write().await.remove(doc_id).is_some())
    }

    async fn query(&self, vector: &[f64], top_k: usize) -> Result<Vec<IndexMatch>, IndexError> {
        self.check_dimensions(vector.len())?;
        let entries = self.entries.read().await;

        let mut matches: Vec<IndexMatch> = entries
            .values()
            .map(|entry| IndexMatch {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                distance: 1.0 - cosine_similarity(&entry.vector, vector),
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.metadata.doc_id.cmp(&b.metadata.doc_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
