//! Siembra de documentos externos (proyectos, normativa, guías) desde
//! directorios de ficheros JSON al almacén de documentos.
//!
//! Cada fichero puede contener un objeto (un documento) o un array (un
//! documento por elemento, numerados como partes). La siembra es idempotente:
//! un documento cuyo `metadata.source_file` (y `part`) ya existe con el mismo
//! tipo no se vuelve a crear.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::app_state::Status;
use crate::config::SeedSource;
use crate::document_store::DocumentStore;
use crate::models::NewDocument;

const TITLE_KEYS: &[&str] = &["title", "name", "document_title"];
const CONTENT_KEYS: &[&str] = &["content", "text", "body"];

/// Resumen de los resultados de una siembra.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub files_scanned: u32,
    pub files_ingested: u32,
    pub files_skipped: u32,
    pub documents_created: usize,
    pub documents_existing: usize,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} sembrados, {} omitidos. {} documentos creados, {} ya existían.",
            self.files_scanned,
            self.files_ingested,
            self.files_skipped,
            self.documents_created,
            self.documents_existing
        )
    }
}

impl IngestionSummary {
    fn absorb(&mut self, other: IngestionSummary) {
        self.files_scanned += other.files_scanned;
        self.files_ingested += other.files_ingested;
        self.files_skipped += other.files_skipped;
        self.documents_created += other.documents_created;
        self.documents_existing += other.documents_existing;
    }
}

/// Clave de idempotencia: (tipo, fichero de origen, parte).
type SeedKey = (String, String, Option<u64>);

fn seed_key(doc_type: &str, metadata: &Map<String, Value>) -> Option<SeedKey> {
    let source_file = metadata.get("source_file")?.as_str()?;
    let part = metadata.get("part").and_then(Value::as_u64);
    Some((doc_type.to_string(), source_file.to_string(), part))
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_tags(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| match t {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Convierte el JSON de un fichero en los documentos que representa.
pub fn documents_from_json(value: &Value, stem: &str, source_file: &str, source: &SeedSource) -> Vec<NewDocument> {
    let base_tags = vec!["railadvice".to_string(), source.doc_type.clone()];

    let build = |title: String, content: String, extra_tags: Vec<String>, part: Option<usize>| {
        let mut metadata = Map::new();
        metadata.insert("source_file".to_string(), json!(source_file));
        if let Some(part) = part {
            metadata.insert("part".to_string(), json!(part));
        }
        let mut tags = base_tags.clone();
        tags.extend(extra_tags);
        NewDocument {
            title,
            content,
            doc_type: source.doc_type.clone(),
            category: source.category.clone(),
            tags,
            metadata,
        }
    };

    match value {
        Value::Object(obj) => {
            let title = first_string(obj, TITLE_KEYS).unwrap_or_else(|| stem.to_string());
            let content = first_string(obj, CONTENT_KEYS).unwrap_or_else(|| pretty(value));
            vec![build(title, content, string_tags(obj), None)]
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let part = i + 1;
                let fallback_title = format!("{stem} - Del {part}");
                match item {
                    Value::Object(obj) => {
                        let title = first_string(obj, TITLE_KEYS).unwrap_or(fallback_title);
                        let content = first_string(obj, CONTENT_KEYS).unwrap_or_else(|| pretty(item));
                        Some(build(title, content, string_tags(obj), Some(part)))
                    }
                    Value::String(s) if !s.trim().is_empty() => {
                        Some(build(fallback_title, s.clone(), Vec::new(), Some(part)))
                    }
                    Value::Null | Value::String(_) => None,
                    other => Some(build(fallback_title, other.to_string(), Vec::new(), Some(part))),
                }
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![build(stem.to_string(), s.clone(), Vec::new(), None)],
        Value::Null | Value::String(_) => Vec::new(),
        other => vec![build(stem.to_string(), other.to_string(), Vec::new(), None)],
    }
}

fn update_status(status: &Arc<Mutex<Status>>, message: String, progress: f32) {
    if let Ok(mut status) = status.lock() {
        status.message = message;
        status.progress = progress;
    }
}

/// Siembra todas las fuentes configuradas. Los directorios inexistentes se
/// omiten con un aviso.
pub async fn seed_sources(
    store: &dyn DocumentStore,
    sources: &[SeedSource],
    status: Arc<Mutex<Status>>,
) -> Result<IngestionSummary> {
    let mut existing: HashSet<SeedKey> = store
        .load_all()
        .await
        .context("No se pudieron leer los documentos existentes")?
        .iter()
        .filter_map(|doc| seed_key(&doc.doc_type, &doc.metadata))
        .collect();

    let mut summary = IngestionSummary::default();
    for source in sources {
        if !source.dir.is_dir() {
            warn!("⚠️ Directorio de siembra no encontrado, se omite: {}", source.dir.display());
            continue;
        }
        let partial = seed_directory(store, source, &mut existing, status.clone()).await?;
        info!("📂 {} ({}): {partial}", source.dir.display(), source.doc_type);
        summary.absorb(partial);
    }
    Ok(summary)
}

async fn seed_directory(
    store: &dyn DocumentStore,
    source: &SeedSource,
    existing: &mut HashSet<SeedKey>,
    status: Arc<Mutex<Status>>,
) -> Result<IngestionSummary> {
    let root = &source.dir;
    if !root.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", root.display()));
    }

    let files: Vec<_> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
        .collect();

    let total = files.len().max(1) as f32;
    let mut summary = IngestionSummary::default();

    for (index, entry) in files.iter().enumerate() {
        summary.files_scanned += 1;
        let path = entry.path();
        let source_file = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        update_status(
            &status,
            format!("[{}/{}] Sembrando: {}...", index + 1, files.len(), source_file),
            (index + 1) as f32 / total,
        );

        match seed_file(store, source, path, &source_file, existing).await {
            Ok((created, already)) => {
                summary.documents_created += created;
                summary.documents_existing += already;
                if created + already == 0 {
                    summary.files_skipped += 1;
                } else {
                    summary.files_ingested += 1;
                }
            }
            Err(err) => {
                summary.files_skipped += 1;
                error!("Error sembrando {}: {err:#}", path.display());
            }
        }
    }

    Ok(summary)
}

async fn seed_file(
    store: &dyn DocumentStore,
    source: &SeedSource,
    path: &Path,
    source_file: &str,
    existing: &mut HashSet<SeedKey>,
) -> Result<(usize, usize)> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("No se pudo leer {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("JSON inválido en {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_file.to_string());

    let mut created = 0;
    let mut already = 0;
    for doc in documents_from_json(&value, &stem, source_file, source) {
        let Some(key) = seed_key(&doc.doc_type, &doc.metadata) else {
            continue;
        };
        if existing.contains(&key) {
            already += 1;
            continue;
        }
        let title = doc.title.clone();
        match store.add(doc).await {
            Ok(added) => {
                info!("✅ Documento sembrado: {} (ID: {})", added.title, added.id);
                existing.insert(key);
                created += 1;
            }
            Err(e) => warn!("⚠️ No se pudo sembrar '{title}': {e}"),
        }
    }
    Ok((created, already))
}
