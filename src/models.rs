//! Modelos de dominio: documentos, entradas indexadas, resultados de consulta
//! y turnos de conversación.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Documento completo (registro del índice + contenido).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn from_record(record: DocumentRecord, content: String) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content,
            doc_type: record.doc_type,
            category: record.category,
            tags: record.tags,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Proyección de metadatos que acompaña al vector en el índice.
    pub fn entry_metadata(&self) -> EntryMetadata {
        EntryMetadata {
            doc_id: self.id.clone(),
            title: self.title.clone(),
            doc_type: self.doc_type.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Registro de un documento en `document_index.json` (sin contenido).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    pub file_path: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Fechas RFC 3339 o, como en los índices antiguos, ISO 8601 sin zona
/// horaria (se interpretan como UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    fn parse_or_error<E: Error>(raw: &str) -> Result<DateTime<Utc>, E> {
        parse(raw).ok_or_else(|| E::custom(format!("fecha no válida: {raw}")))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_or_error(&raw)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_or_error(&raw))
            .transpose()
    }
}

/// Datos para crear un documento.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default = "default_kind")]
    pub doc_type: String,
    #[serde(default = "default_kind")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_kind() -> String {
    "general".to_string()
}

/// Cambios parciales sobre un documento existente. El contenido se reescribe
/// completo; el resto de campos sólo si vienen informados.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
}

/// Filtro para listar/buscar documentos.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    #[serde(rename = "q")]
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// Estadísticas agregadas del almacén.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub document_types: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
}

/// Metadatos de un documento tal y como viajan con su vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub doc_id: String,
    pub title: String,
    pub doc_type: String,
    pub category: String,
    pub tags: Vec<String>,
}

/// Entrada del índice vectorial: uno a uno con un documento embebido.
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub vector: Vec<f64>,
    pub text: String,
    pub metadata: EntryMetadata,
}

/// Candidato devuelto por el índice vectorial. `distance` sigue la convención
/// "menor es más parecido", acotada en [0, 2].
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub text: String,
    pub metadata: EntryMetadata,
    pub distance: f64,
}

/// Documento seleccionado para la respuesta. Su puntuación ajustada va en
/// `QueryResult::similarity_scores`, en la misma posición.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedDocument {
    pub doc_id: String,
    pub title: String,
    pub category: String,
    pub text: String,
}

/// Etiqueta de confianza que acompaña a cada respuesta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[serde(rename = "No Documents")]
    NoDocuments,
    Error,
    Loading,
    Greeting,
    Identity,
    Help,
    Farewell,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::NoDocuments => "No Documents",
            Self::Error => "Error",
            Self::Loading => "Loading",
            Self::Greeting => "Greeting",
            Self::Identity => "Identity",
            Self::Help => "Help",
            Self::Farewell => "Farewell",
        }
    }

    /// Orden Low < Medium < High; `None` para las etiquetas que no provienen
    /// de una puntuación.
    pub fn level(&self) -> Option<u8> {
        match self {
            Self::Low => Some(0),
            Self::Medium => Some(1),
            Self::High => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resultado completo de una consulta.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub matched_documents: Vec<MatchedDocument>,
    pub similarity_scores: Vec<f64>,
    pub confidence: Confidence,
    pub intent: String,
    pub intent_categories: Vec<String>,
    pub specific_terms: Vec<String>,
}

impl QueryResult {
    /// Resultado sin documentos (plantillas y salidas tempranas).
    pub fn bare(
        answer: String,
        confidence: Confidence,
        intent: impl Into<String>,
        intent_categories: Vec<String>,
    ) -> Self {
        Self {
            answer,
            matched_documents: Vec::new(),
            similarity_scores: Vec::new(),
            confidence,
            intent: intent.into(),
            intent_categories,
            specific_terms: Vec::new(),
        }
    }

    pub fn sources(&self) -> usize {
        self.matched_documents.len()
    }
}

/// Un intercambio usuario/asistente en la memoria conversacional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub ai: String,
}
