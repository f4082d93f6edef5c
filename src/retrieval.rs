//! Motor de recuperación y ranking.
//!
//! Flujo de `find`:
//!   1. Sin documentos indexados → `No Documents`.
//!   2. Embedding de la pregunta y consulta top-K al índice vectorial.
//!   3. `score = 1 - distancia` + bonus por título y por categoría.
//!   4. Orden descendente; pasan los `answer_documents` mejores.
//!   5. Etiqueta de confianza según la mejor puntuación ajustada.
//!
//! Cualquier fallo de embedding o de índice se registra y se devuelve como
//! confianza `Error`; nunca se propaga al llamante.
//!
//! La recarga completa (`reload`) toma el lado de escritura de `gate`; las
//! consultas toman el de lectura, así que nunca ven un índice a medio cargar.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RankingConfig;
use crate::document_store::DocumentStore;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::keywords::Extraction;
use crate::models::{Confidence, EntryMetadata, IndexMatch, IndexedEntry};
use crate::sentences::sentence_mentioning;
use crate::vector_store::VectorIndex;

/// Estado de disponibilidad del motor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Todavía no ha terminado la primera carga.
    Loading,
    Ready,
    Failed(String),
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Candidato re-rankeado.
#[derive(Debug, Clone)]
pub struct RankedMatch {
    pub text: String,
    pub metadata: EntryMetadata,
    pub score: f64,
}

/// Resultado de `find`: documentos ordenados y confianza.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub documents: Vec<RankedMatch>,
    pub confidence: Confidence,
}

impl Retrieval {
    fn empty(confidence: Confidence) -> Self {
        Self {
            documents: Vec::new(),
            confidence,
        }
    }
}

/// Resultado de [`RetrievalEngine::lookup_word`].
#[derive(Debug, Clone, PartialEq)]
pub struct WordLookup {
    pub word: String,
    pub sentence: String,
    pub doc_id: String,
}

/// Resumen de una recarga completa.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ReloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resumen: {} documentos leídos, {} indexados, {} omitidos sin contenido, {} con error.",
            self.total, self.indexed, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: EngineState,
    indexed: Arc<Vec<EntryMetadata>>,
}

/// Motor de recuperación: embedder + índice vectorial + pesos de ranking.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    ranking: RankingConfig,
    gate: RwLock<()>,
    snapshot: RwLock<Snapshot>,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        ranking: RankingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            ranking,
            gate: RwLock::new(()),
            snapshot: RwLock::new(Snapshot {
                state: EngineState::Loading,
                indexed: Arc::new(Vec::new()),
            }),
        }
    }

    pub async fn state(&self) -> EngineState {
        self.snapshot.read().await.state.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == EngineState::Ready
    }

    pub async fn indexed_count(&self) -> usize {
        self.snapshot.read().await.indexed.len()
    }

    /// Metadatos de los documentos indexados en la última recarga.
    pub async fn indexed_metadata(&self) -> Arc<Vec<EntryMetadata>> {
        self.snapshot.read().await.indexed.clone()
    }

    pub fn backend(&self) -> &'static str {
        self.index.backend()
    }

    pub fn embedder_name(&self) -> String {
        self.embedder.name()
    }

    /// Versión total de [`try_find`](Self::try_find): los fallos se convierten
    /// en una etiqueta de confianza.
    pub async fn find(&self, question: &str, extraction: &Extraction) -> Retrieval {
        match self.try_find(question, extraction).await {
            Ok(retrieval) => retrieval,
            Err(RetrievalError::NotReady) => Retrieval::empty(Confidence::Loading),
            Err(e) => {
                warn!("⚠️ Error en la búsqueda: {e}");
                Retrieval::empty(Confidence::Error)
            }
        }
    }

    pub async fn try_find(
        &self,
        question: &str,
        extraction: &Extraction,
    ) -> Result<Retrieval, RetrievalError> {
        let _gate = self.gate.read().await;
        let indexed = self.ready_snapshot().await?;

        if indexed.is_empty() {
            return Ok(Retrieval::empty(Confidence::NoDocuments));
        }
        if question.trim().is_empty() {
            return Ok(Retrieval::empty(Confidence::Low));
        }

        let query_vec = self.embedder.embed(question).await?;
        let candidates = self.index.query(&query_vec, self.ranking.top_k).await?;
        debug!("🔍 La búsqueda semántica devolvió {} candidatos", candidates.len());

        let mut ranked = rank_candidates(question, candidates, &extraction.categories, &self.ranking);
        let confidence = ranked
            .first()
            .map(|best| confidence_for(best.score, &self.ranking))
            .unwrap_or(Confidence::Low);
        ranked.truncate(self.ranking.answer_documents);

        debug!("🔍 Devolviendo {} documentos con confianza {}", ranked.len(), confidence);
        Ok(Retrieval {
            documents: ranked,
            confidence,
        })
    }

    /// Consulta de una sola palabra: documento más cercano y primera frase
    /// con contenido que la menciona.
    pub async fn lookup_word(&self, word: &str) -> Result<Option<WordLookup>, RetrievalError> {
        let _gate = self.gate.read().await;
        let indexed = self.ready_snapshot().await?;
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if indexed.is_empty() || word.is_empty() {
            return Ok(None);
        }

        let query_vec = self.embedder.embed(word).await?;
        let Some(nearest) = self.index.query(&query_vec, 1).await?.into_iter().next() else {
            return Ok(None);
        };
        Ok(sentence_mentioning(&nearest.text, word).map(|sentence| WordLookup {
            word: word.to_string(),
            sentence,
            doc_id: nearest.metadata.doc_id,
        }))
    }

    /// Borra un documento del índice sin esperar a la siguiente recarga.
    pub async fn forget(&self, doc_id: &str) -> Result<bool, RetrievalError> {
        let _gate = self.gate.read().await;
        let removed = self.index.remove(doc_id).await?;

        let mut snapshot = self.snapshot.write().await;
        if snapshot.indexed.iter().any(|m| m.doc_id == doc_id) {
            let remaining: Vec<EntryMetadata> = snapshot
                .indexed
                .iter()
                .filter(|m| m.doc_id != doc_id)
                .cloned()
                .collect();
            snapshot.indexed = Arc::new(remaining);
        }
        Ok(removed)
    }

    /// Vacía el índice y lo reconstruye con todos los documentos del almacén.
    /// `progress(hechos, total)` se llama tras cada documento.
    pub async fn reload<F>(
        &self,
        store: &dyn DocumentStore,
        progress: F,
    ) -> Result<ReloadSummary, RetrievalError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let _gate = self.gate.write().await;
        info!("🔄 Recargando el índice vectorial ({})...", self.index.backend());

        match self.rebuild(store, &progress).await {
            Ok((summary, indexed)) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.state = EngineState::Ready;
                snapshot.indexed = Arc::new(indexed);
                info!("✅ Índice recargado. {summary}");
                Ok(summary)
            }
            Err(e) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.state = EngineState::Failed(e.to_string());
                snapshot.indexed = Arc::new(Vec::new());
                warn!("❌ Falló la recarga del índice: {e}");
                Err(e)
            }
        }
    }

    async fn rebuild<F>(
        &self,
        store: &dyn DocumentStore,
        progress: &F,
    ) -> Result<(ReloadSummary, Vec<EntryMetadata>), RetrievalError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        self.index.clear().await?;
        let documents = store.load_all().await?;

        let mut summary = ReloadSummary {
            total: documents.len(),
            ..ReloadSummary::default()
        };
        let mut indexed = Vec::with_capacity(documents.len());

        for (i, doc) in documents.iter().enumerate() {
            if doc.content.trim().is_empty() {
                warn!("⚠️ Omitiendo documento sin contenido: {}", doc.title);
                summary.skipped += 1;
            } else {
                match self.embedder.embed(&doc.content).await {
                    Ok(vector) => {
                        let metadata = doc.entry_metadata();
                        let entry = IndexedEntry {
                            vector,
                            text: doc.content.clone(),
                            metadata: metadata.clone(),
                        };
                        match self.index.upsert(entry).await {
                            Ok(()) => {
                                summary.indexed += 1;
                                indexed.push(metadata);
                            }
                            Err(e) => {
                                warn!("⚠️ No se pudo indexar '{}': {e}", doc.title);
                                summary.failed += 1;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("⚠️ No se pudo embeber '{}': {e}", doc.title);
                        summary.failed += 1;
                    }
                }
            }
            progress(i + 1, documents.len());
        }

        Ok((summary, indexed))
    }

    async fn ready_snapshot(&self) -> Result<Arc<Vec<EntryMetadata>>, RetrievalError> {
        let snapshot = self.snapshot.read().await;
        match &snapshot.state {
            EngineState::Ready => Ok(snapshot.indexed.clone()),
            EngineState::Loading => Err(RetrievalError::NotReady),
            EngineState::Failed(reason) => Err(RetrievalError::Unavailable(reason.clone())),
        }
    }
}

/// Tokens en minúsculas sin puntuación alrededor.
fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Re-ranking de candidatos: `1 - distancia` más los bonus de título y
/// categoría. Orden descendente por puntuación, empates por `doc_id`.
pub fn rank_candidates(
    question: &str,
    candidates: Vec<IndexMatch>,
    categories: &[String],
    cfg: &RankingConfig,
) -> Vec<RankedMatch> {
    let question_words = word_set(question);

    let mut ranked: Vec<RankedMatch> = candidates
        .into_iter()
        .map(|candidate| {
            let mut score = 1.0 - candidate.distance;

            let title_words = word_set(&candidate.metadata.title);
            if !question_words.is_disjoint(&title_words) {
                score += cfg.title_bonus;
            }
            if categories.iter().any(|c| c == &candidate.metadata.category) {
                score += cfg.category_bonus;
            }

            RankedMatch {
                text: candidate.text,
                metadata: candidate.metadata,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.metadata.doc_id.cmp(&b.metadata.doc_id))
    });
    ranked
}

/// Umbrales estrictos: `> high` → High, `> medium` → Medium, si no Low.
pub fn confidence_for(score: f64, cfg: &RankingConfig) -> Confidence {
    if score > cfg.high_threshold {
        Confidence::High
    } else if score > cfg.medium_threshold {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, category: &str, distance: f64) -> IndexMatch {
        IndexMatch {
            text: format!("Innhold i {title}."),
            metadata: EntryMetadata {
                doc_id: id.to_string(),
                title: title.to_string(),
                doc_type: "technical".to_string(),
                category: category.to_string(),
                tags: Vec::new(),
            },
            distance,
        }
    }

    #[test]
    fn title_bonus_outranks_closer_text_within_margin() {
        let cfg = RankingConfig::default();
        let candidates = vec![
            candidate("closer", "Signalanlegg på Vestfoldbanen", "teknologi", 0.30),
            candidate("titled", "ETCS Level 2", "teknologi", 0.65),
        ];
        let ranked = rank_candidates(
            "Hva er ETCS Level 2?",
            candidates,
            &["teknologi".to_string()],
            &cfg,
        );
        assert_eq!(ranked[0].metadata.doc_id, "titled");
        assert!((ranked[0].score - (0.35 + 0.4 + 0.2)).abs() < 1e-9);
        assert!((ranked[1].score - (0.70 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn category_bonus_needs_an_extracted_category() {
        let cfg = RankingConfig::default();
        let ranked = rank_candidates(
            "noe helt annet",
            vec![candidate("a", "Depot", "prosjekt", 0.5)],
            &[],
            &cfg,
        );
        assert!((ranked[0].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn thresholds_are_strict() {
        let cfg = RankingConfig::default();
        assert_eq!(confidence_for(1.0, &cfg), Confidence::Medium);
        assert_eq!(confidence_for(1.0001, &cfg), Confidence::High);
        assert_eq!(confidence_for(0.7, &cfg), Confidence::Low);
        assert_eq!(confidence_for(0.71, &cfg), Confidence::Medium);
    }

    #[test]
    fn confidence_is_monotonic_in_score() {
        let cfg = RankingConfig::default();
        let mut previous = 0u8;
        for step in 0..=300 {
            let score = -0.5 + step as f64 * 0.01;
            let level = confidence_for(score, &cfg).level().unwrap();
            assert!(level >= previous, "score {score} bajó la confianza");
            previous = level;
        }
        assert_eq!(previous, 2);
    }

    #[test]
    fn reload_summary_reads_well() {
        let summary = ReloadSummary {
            total: 3,
            indexed: 2,
            skipped: 1,
            failed: 0,
        };
        assert!(summary.to_string().contains("2 indexados"));
    }
}
