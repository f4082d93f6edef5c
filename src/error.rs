//! Tipos de error por frontera de componente.
//!
//! El cableado de la aplicación (configuración, arranque, siembra) usa
//! `anyhow`; los componentes del pipeline devuelven estos enums para que el
//! llamante distinga la causa del fallo.

use thiserror::Error;

/// Fallos al generar un embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Error del proveedor de embeddings ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("No se puede embeber un texto vacío")]
    EmptyInput,

    #[error("Número de embeddings ({actual}) distinto al número de textos ({expected})")]
    CountMismatch { expected: usize, actual: usize },
}

/// Fallos del índice vectorial.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Error del índice vectorial ({backend}): {message}")]
    Backend { backend: String, message: String },

    #[error("Dimensión de vector incorrecta: esperada {expected}, recibida {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Fallos del almacén de documentos.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Documento no encontrado: {0}")]
    NotFound(String),

    #[error("El contenido del documento no puede estar vacío")]
    EmptyContent,

    #[error("Error de E/S en el almacén: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON inválido en el almacén: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fallos del motor de recuperación.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("El motor todavía no está listo")]
    NotReady,

    #[error("El motor no está disponible: {0}")]
    Unavailable(String),
}
