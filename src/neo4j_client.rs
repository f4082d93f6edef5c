//! Integración con Neo4j como índice vectorial de documentos.
//!
//! Cada documento embebido es un nodo `(:IndexedEntry {doc_id})` con su texto,
//! sus metadatos y el vector en `embedding`, indexado por
//! `indexedEntryEmbeddingIndex` (similitud coseno).

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

use crate::config::Neo4jConfig;
use crate::error::IndexError;
use crate::models::{EntryMetadata, IndexMatch, IndexedEntry};
use crate::vector_store::VectorIndex;

const INDEX_NAME: &str = "indexedEntryEmbeddingIndex";

pub async fn connect_from_config(cfg: &Neo4jConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.user, &cfg.password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea el constraint de unicidad y el índice vectorial si no existen.
pub async fn ensure_schema(graph: &Graph, dimensions: usize) -> Result<()> {
    graph
        .run(query(
            "CREATE CONSTRAINT indexed_entry_doc_id IF NOT EXISTS
             FOR (e:IndexedEntry)
             REQUIRE e.doc_id IS UNIQUE",
        ))
        .await?;

    let mut cursor = graph
        .execute(
            query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                .param("name", INDEX_NAME),
        )
        .await?;

    if cursor.next().await?.is_some() {
        info!("Índice vectorial '{INDEX_NAME}' ya existe.");
        return Ok(());
    }

    let cypher = format!(
        "\
CREATE VECTOR INDEX {INDEX_NAME}
FOR (e:IndexedEntry)
ON (e.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimensions},
    `vector.similarity_function`: 'cosine'
  }}
}}"
    );
    graph.run(query(&cypher)).await?;
    info!("Índice vectorial '{INDEX_NAME}' creado ({dimensions} dimensiones).");

    Ok(())
}

/// Convierte la puntuación de `db.index.vector.queryNodes` en `1 - cos`, la
/// misma distancia en [0, 2] que usa el índice en memoria.
pub fn distance_from_score(score: f64) -> f64 {
    2.0 * (1.0 - score.clamp(0.0, 1.0))
}

/// Índice vectorial respaldado por Neo4j.
///
/// Neo4j devuelve una similitud coseno normalizada a [0, 1], `(1 + cos) / 2`;
/// ver [`distance_from_score`].
pub struct Neo4jVectorIndex {
    graph: Arc<Graph>,
}

impl Neo4jVectorIndex {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }
}

fn backend_error(e: neo4rs::Error) -> IndexError {
    IndexError::Backend {
        backend: "neo4j".to_string(),
        message: e.to_string(),
    }
}

fn missing_field(field: &str) -> IndexError {
    IndexError::Backend {
        backend: "neo4j".to_string(),
        message: format!("Falta campo '{field}' en resultado de Neo4j"),
    }
}

#[async_trait]
impl VectorIndex for Neo4jVectorIndex {
    async fn clear(&self) -> Result<(), IndexError> {
        self.graph
            .run(query("MATCH (e:IndexedEntry) DETACH DELETE e"))
            .await
            .map_err(backend_error)
    }

    async fn upsert(&self, entry: IndexedEntry) -> Result<(), IndexError> {
        let meta = entry.metadata;
        self.graph
            .run(
                query(
                    "MERGE (e:IndexedEntry {doc_id: $doc_id})
                     SET e.title = $title, e.doc_type = $doc_type, e.category = $category,
                         e.tags = $tags, e.text = $text, e.embedding = $embedding",
                )
                .param("doc_id", meta.doc_id)
                .param("title", meta.title)
                .param("doc_type", meta.doc_type)
                .param("category", meta.category)
                .param("tags", meta.tags)
                .param("text", entry.text)
                .param("embedding", entry.vector),
            )
            .await
            .map_err(backend_error)
    }

    async fn remove(&self, doc_id: &str) -> Result<bool, IndexError> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (e:IndexedEntry {doc_id: $doc_id})
                     WITH e, e.doc_id AS id
                     DETACH DELETE e
                     RETURN count(id) AS removed",
                )
                .param("doc_id", doc_id.to_string()),
            )
            .await
            .map_err(backend_error)?;

        let removed = match cursor.next().await.map_err(backend_error)? {
            Some(row) => row.get::<i64>("removed").unwrap_or(0),
            None => 0,
        };
        Ok(removed > 0)
    }

    async fn query(&self, vector: &[f64], top_k: usize) -> Result<Vec<IndexMatch>, IndexError> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                     YIELD node, score
                     RETURN node.doc_id AS doc_id, node.title AS title, node.doc_type AS doc_type,
                            node.category AS category, node.tags AS tags, node.text AS text, score
                     ORDER BY score DESC",
                )
                .param("index_name", INDEX_NAME)
                .param("k", top_k as i64)
                .param("embedding", vector.to_vec()),
            )
            .await
            .map_err(backend_error)?;

        let mut output = Vec::new();
        while let Some(row) = cursor.next().await.map_err(backend_error)? {
            let doc_id: String = row.get("doc_id").ok_or_else(|| missing_field("doc_id"))?;
            let text: String = row.get("text").ok_or_else(|| missing_field("text"))?;
            let score: f64 = row.get("score").ok_or_else(|| missing_field("score"))?;

            output.push(IndexMatch {
                text,
                metadata: EntryMetadata {
                    doc_id,
                    title: row.get("title").unwrap_or_default(),
                    doc_type: row.get("doc_type").unwrap_or_default(),
                    category: row.get("category").unwrap_or_default(),
                    tags: row.get("tags").unwrap_or_default(),
                },
                distance: distance_from_score(score),
            });
        }

        Ok(output)
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }
}
