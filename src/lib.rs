//! Asistente de preguntas y respuestas de RailAdvice: almacén de documentos,
//! búsqueda vectorial con re-ranking y respuestas en noruego, servido por HTTP.

pub mod api;
pub mod app_state;
pub mod classifier;
pub mod config;
pub mod document_store;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod keywords;
pub mod memory;
pub mod models;
pub mod neo4j_client;
pub mod pipeline;
pub mod response;
pub mod retrieval;
pub mod sentences;
pub mod vector_store;
