//! Almacén de documentos.
//!
//! El pipeline consume el trait [`DocumentStore`]. [`FileDocumentStore`] es la
//! implementación basada en ficheros:
//!
//! ```text
//! <data_dir>/document_index.json      id -> registro (sin contenido)
//! <data_dir>/content/<id>.json        {id, title, content, created_at, updated_at}
//! ```
//!
//! Un único `RwLock` serializa los ciclos leer-modificar-escribir del índice;
//! los lectores comparten el lock.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    timestamp, Document, DocumentFilter, DocumentPatch, DocumentRecord, NewDocument, StoreStats,
};

const INDEX_VERSION: &str = "2.0";
const DEFAULT_LIST_LIMIT: usize = 100;
const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Operaciones que el resto del sistema necesita del almacén.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn add(&self, doc: NewDocument) -> Result<Document, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Registros más recientes primero.
    async fn list(&self, limit: Option<usize>) -> Result<Vec<DocumentRecord>, StoreError>;

    async fn search(&self, filter: &DocumentFilter) -> Result<Vec<Document>, StoreError>;

    async fn remove(&self, id: &str) -> Result<bool, StoreError>;

    async fn update(&self, id: &str, patch: DocumentPatch) -> Result<Option<Document>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Todos los documentos con contenido legible.
    async fn load_all(&self) -> Result<Vec<Document>, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMetadata {
    #[serde(deserialize_with = "timestamp::deserialize")]
    created: DateTime<Utc>,
    version: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexFile {
    documents: BTreeMap<String, DocumentRecord>,
    metadata: IndexMetadata,
}

impl IndexFile {
    fn empty() -> Self {
        Self {
            documents: BTreeMap::new(),
            metadata: IndexMetadata {
                created: Utc::now(),
                version: INDEX_VERSION.to_string(),
                last_updated: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentFile {
    id: String,
    title: String,
    content: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    updated_at: Option<DateTime<Utc>>,
}

/// Almacén en ficheros JSON.
pub struct FileDocumentStore {
    content_dir: PathBuf,
    index_file: PathBuf,
    index: RwLock<IndexFile>,
}

impl FileDocumentStore {
    /// Abre (o crea) el almacén en `data_dir`. Un índice corrupto es un error:
    /// no se sobrescribe.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let content_dir = data_dir.join("content");
        fs::create_dir_all(&content_dir).await?;

        let index_file = data_dir.join("document_index.json");
        let index = match fs::read(&index_file).await {
            Ok(bytes) => serde_json::from_slice::<IndexFile>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexFile::empty(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Almacén de documentos abierto en {} ({} documentos)",
            data_dir.display(),
            index.documents.len()
        );

        Ok(Self {
            content_dir,
            index_file,
            index: RwLock::new(index),
        })
    }

    /// Escribe `next` en disco y sólo entonces lo sustituye en memoria.
    async fn commit_index(&self, current: &mut IndexFile, mut next: IndexFile) -> Result<(), StoreError> {
        next.metadata.last_updated = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.index_file, &json).await?;
        *current = next;
        Ok(())
    }

    async fn write_content(&self, file: &ContentFile, file_path: &str) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(file)?;
        write_atomic(&self.content_dir.join(file_path), &json).await
    }

    /// Lee el fichero de contenido; si falta o está corrupto, `None`.
    async fn read_content(&self, record: &DocumentRecord) -> Option<ContentFile> {
        let path = self.content_dir.join(&record.file_path);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("No se pudo leer el contenido de {} ({}): {}", record.id, path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice::<ContentFile>(&bytes) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Contenido corrupto para {}: {}. Se trata como ausente.", record.id, e);
                None
            }
        }
    }

    async fn hydrate(&self, record: &DocumentRecord) -> Option<Document> {
        let content = self.read_content(record).await?;
        Some(Document::from_record(record.clone(), content.content))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn matches_filter(record: &DocumentRecord, filter: &DocumentFilter) -> bool {
    if let Some(doc_type) = &filter.doc_type {
        if &record.doc_type != doc_type {
            return false;
        }
    }
    if let Some(category) = &filter.category {
        if &record.category != category {
            return false;
        }
    }
    if let Some(tag) = &filter.tag {
        if !record.tags.iter().any(|t| t == tag) {
            return false;
        }
    }
    true
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn add(&self, doc: NewDocument) -> Result<Document, StoreError> {
        if doc.content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let file_path = format!("{id}.json");

        let record = DocumentRecord {
            id: id.clone(),
            title: doc.title.clone(),
            doc_type: doc.doc_type,
            category: doc.category,
            tags: dedup_tags(doc.tags),
            created_at: now,
            updated_at: now,
            file_path: file_path.clone(),
            metadata: doc.metadata,
        };
        let content = ContentFile {
            id: id.clone(),
            title: doc.title,
            content: doc.content,
            created_at: now,
            updated_at: None,
        };

        let mut index = self.index.write().await;
        self.write_content(&content, &file_path).await?;
        let mut next = index.clone();
        next.documents.insert(id.clone(), record.clone());
        if let Err(e) = self.commit_index(&mut index, next).await {
            if let Err(cleanup) = fs::remove_file(self.content_dir.join(&file_path)).await {
                warn!("No se pudo limpiar el contenido huérfano de {id}: {cleanup}");
            }
            return Err(e);
        }

        info!("✅ Documento añadido: {} (ID: {})", record.title, id);
        Ok(Document::from_record(record, content.content))
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let index = self.index.read().await;
        match index.documents.get(id) {
            Some(record) => Ok(self.hydrate(record).await),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<DocumentRecord>, StoreError> {
        let index = self.index.read().await;
        let mut records: Vec<DocumentRecord> = index.documents.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.unwrap_or(DEFAULT_LIST_LIMIT));
        Ok(records)
    }

    async fn search(&self, filter: &DocumentFilter) -> Result<Vec<Document>, StoreError> {
        let index = self.index.read().await;
        let needle = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut results = Vec::new();
        for record in index.documents.values().filter(|r| matches_filter(r, filter)) {
            let Some(doc) = self.hydrate(record).await else {
                continue;
            };
            if let Some(needle) = &needle {
                let hit = doc.title.to_lowercase().contains(needle)
                    || doc.tags.iter().any(|t| t.to_lowercase().contains(needle))
                    || doc.content.to_lowercase().contains(needle);
                if !hit {
                    continue;
                }
            }
            results.push(doc);
        }

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(filter.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
        Ok(results)
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut index = self.index.write().await;
        let mut next = index.clone();
        let Some(record) = next.documents.remove(id) else {
            warn!("❌ Documento {id} no encontrado");
            return Ok(false);
        };
        self.commit_index(&mut index, next).await?;

        let content_path = self.content_dir.join(&record.file_path);
        match fs::remove_file(&content_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("No se pudo borrar {}: {e}", content_path.display()),
        }

        info!("✅ Documento eliminado: {}", record.title);
        Ok(true)
    }

    async fn update(&self, id: &str, patch: DocumentPatch) -> Result<Option<Document>, StoreError> {
        if matches!(&patch.content, Some(c) if c.trim().is_empty()) {
            return Err(StoreError::EmptyContent);
        }

        let mut index = self.index.write().await;
        let Some(mut record) = index.documents.get(id).cloned() else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut content = self.read_content(&record).await.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            record.title = title.clone();
            content.title = title;
        }
        if let Some(new_content) = patch.content {
            content.content = new_content;
        }
        if let Some(doc_type) = patch.doc_type {
            record.doc_type = doc_type;
        }
        if let Some(category) = patch.category {
            record.category = category;
        }
        if let Some(tags) = patch.tags {
            record.tags = dedup_tags(tags);
        }
        if let Some(metadata) = patch.metadata {
            record.metadata.extend(metadata);
        }
        record.updated_at = now;
        content.updated_at = Some(now);

        self.write_content(&content, &record.file_path).await?;
        let mut next = index.clone();
        next.documents.insert(id.to_string(), record.clone());
        self.commit_index(&mut index, next).await?;

        Ok(Some(Document::from_record(record, content.content)))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let index = self.index.read().await;
        let mut stats = StoreStats {
            total_documents: index.documents.len(),
            ..StoreStats::default()
        };
        for record in index.documents.values() {
            *stats.document_types.entry(record.doc_type.clone()).or_insert(0) += 1;
            *stats.categories.entry(record.category.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.index.read().await.documents.len())
    }

    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        let index = self.index.read().await;
        let mut docs = Vec::with_capacity(index.documents.len());
        for record in index.documents.values() {
            match self.hydrate(record).await {
                Some(doc) => docs.push(doc),
                None => warn!("⚠️ No se pudo cargar el contenido del documento {}", record.id),
            }
        }
        Ok(docs)
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn new_doc(title: &str, content: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            content: content.to_string(),
            doc_type: "technical".to_string(),
            category: "teknologi".to_string(),
            tags: vec!["etcs".to_string(), "etcs".to_string(), "signal".to_string()],
            ..NewDocument::default()
        }
    }

    #[tokio::test]
    async fn add_then_get_returns_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = assert_ok!(FileDocumentStore::open(dir.path()).await);

        let content = "Linje 1: «ETCS» — {\"ikke\": json}\n\ttabulator og æøå.";
        let added = assert_ok!(store.add(new_doc("ETCS Level 2", content)).await);
        let fetched = store.get(&added.id).await.unwrap().unwrap();

        assert_eq!(fetched.content, content);
        assert_eq!(fetched.tags, vec!["etcs", "signal"]);
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileDocumentStore::open(dir.path()).await.unwrap();
            store.add(new_doc("RAMS", "RAMS-analyse etter EN 50126.")).await.unwrap().id
        };
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let doc = store.add(new_doc("TSI", "TSI samsvar for infrastruktur.")).await.unwrap();

        assert!(store.remove(&doc.id).await.unwrap());
        assert!(!store.remove(&doc.id).await.unwrap());
        assert!(store.get(&doc.id).await.unwrap().is_none());
        assert!(!dir.path().join("content").join(format!("{}.json", doc.id)).exists());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let err = assert_err!(store.add(new_doc("Tom", "   ")).await);
        assert!(matches!(err, StoreError::EmptyContent));
    }

    #[tokio::test]
    async fn update_rewrites_content_and_patches_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let doc = store.add(new_doc("Flytoget", "Gammel tekst om Flytoget.")).await.unwrap();

        let patch = DocumentPatch {
            content: Some("Ny tekst om Type 78.".to_string()),
            category: Some("prosjekt".to_string()),
            ..DocumentPatch::default()
        };
        let updated = store.update(&doc.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.content, "Ny tekst om Type 78.");
        assert_eq!(updated.category, "prosjekt");
        assert_eq!(updated.title, "Flytoget");
        assert!(updated.updated_at >= doc.updated_at);

        assert!(store.update("missing", DocumentPatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn opens_index_with_naive_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let id = "5b8e1c7a-0d2f-4c4e-9a51-3f6f0c2d9e10";
        let index = serde_json::json!({
            "documents": {
                id: {
                    "id": id,
                    "title": "Drammensbanen",
                    "type": "project",
                    "category": "prosjekt",
                    "tags": ["signal"],
                    "created_at": "2024-02-10T14:03:27.512034",
                    "updated_at": "2024-02-10T14:03:27.512034",
                    "file_path": format!("{id}.json"),
                    "metadata": {}
                }
            },
            "metadata": {"created": "2024-02-10T14:00:00.000001", "version": "2.0"}
        });
        std::fs::write(dir.path().join("document_index.json"), index.to_string()).unwrap();
        std::fs::create_dir_all(dir.path().join("content")).unwrap();
        let content = serde_json::json!({
            "id": id,
            "title": "Drammensbanen",
            "content": "Nytt signalanlegg på Drammensbanen.",
            "created_at": "2024-02-10T14:03:27.512034"
        });
        std::fs::write(dir.path().join("content").join(format!("{id}.json")), content.to_string()).unwrap();

        let store = assert_ok!(FileDocumentStore::open(dir.path()).await);
        let doc = store.get(id).await.unwrap().unwrap();
        assert_eq!(doc.content, "Nytt signalanlegg på Drammensbanen.");
        assert_eq!(doc.created_at.timestamp_subsec_micros(), 512034);
    }

    #[tokio::test]
    async fn failed_index_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let kept = store.add(new_doc("Ofotbanen", "Kapasitetsøkning på Ofotbanen.")).await.unwrap();

        // Un directorio en lugar del fichero de índice hace fallar el rename.
        let index_path = dir.path().join("document_index.json");
        std::fs::remove_file(&index_path).unwrap();
        std::fs::create_dir(&index_path).unwrap();
        std::fs::write(index_path.join("blokk"), "x").unwrap();

        assert_err!(store.add(new_doc("Ringeriksbanen", "Ny bane til Hønefoss.")).await);
        assert_eq!(store.count().await.unwrap(), 1);
        let content_files = std::fs::read_dir(dir.path().join("content")).unwrap().count();
        assert_eq!(content_files, 1);

        assert_err!(store.remove(&kept.id).await);
        assert!(store.get(&kept.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_content_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        let doc = store.add(new_doc("Bybanen", "Bybanen i Bergen.")).await.unwrap();

        std::fs::write(dir.path().join("content").join(format!("{}.json", doc.id)), "{not json").unwrap();

        assert!(store.get(&doc.id).await.unwrap().is_none());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_filters_by_type_tag_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        store.add(new_doc("ETCS Level 2", "Radiobasert signalering.")).await.unwrap();
        store
            .add(NewDocument {
                title: "Fornebubanen".to_string(),
                content: "Metro til Fornebu, kostnad 20 milliarder.".to_string(),
                doc_type: "project".to_string(),
                category: "prosjekt".to_string(),
                tags: vec!["metro".to_string()],
                ..NewDocument::default()
            })
            .await
            .unwrap();

        let by_type = DocumentFilter {
            doc_type: Some("project".to_string()),
            ..DocumentFilter::default()
        };
        assert_eq!(store.search(&by_type).await.unwrap().len(), 1);

        let by_tag = DocumentFilter {
            tag: Some("etcs".to_string()),
            ..DocumentFilter::default()
        };
        assert_eq!(store.search(&by_tag).await.unwrap()[0].title, "ETCS Level 2");

        let by_text = DocumentFilter {
            query: Some("KOSTNAD".to_string()),
            ..DocumentFilter::default()
        };
        assert_eq!(store.search(&by_text).await.unwrap()[0].title, "Fornebubanen");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.document_types.get("project"), Some(&1));
    }
}
