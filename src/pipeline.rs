//! Pipeline de pregunta-respuesta: clasificación → extracción → recuperación
//! → generación.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::classifier::{InputClassifier, IntentLabel};
use crate::document_store::DocumentStore;
use crate::keywords::KeywordExtractor;
use crate::models::{Confidence, MatchedDocument, QueryResult};
use crate::response::{ResponseContext, ResponseGenerator, LOADING, NO_DOCUMENTS, PROCESSING_ERROR};
use crate::retrieval::{EngineState, RetrievalEngine};

/// Cualquier cosa capaz de contestar una pregunta. `ask` es total: los fallos
/// internos se reflejan en la etiqueta de confianza del resultado.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn ask(&self, question: &str) -> QueryResult;
}

/// Etiqueta de confianza para las intenciones que se contestan con plantilla.
fn template_confidence(intent: &IntentLabel) -> Confidence {
    match intent {
        IntentLabel::Identity => Confidence::Identity,
        IntentLabel::Help => Confidence::Help,
        IntentLabel::Farewell => Confidence::Farewell,
        _ => Confidence::Greeting,
    }
}

pub struct QaPipeline {
    classifier: InputClassifier,
    extractor: KeywordExtractor,
    generator: ResponseGenerator,
    engine: Arc<RetrievalEngine>,
    store: Arc<dyn DocumentStore>,
}

impl QaPipeline {
    pub fn new(engine: Arc<RetrievalEngine>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            classifier: InputClassifier::default(),
            extractor: KeywordExtractor::with_rule_based_recognizer(),
            generator: ResponseGenerator::new(),
            engine,
            store,
        }
    }

    pub fn with_classifier(mut self, classifier: InputClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    async fn document_count(&self) -> usize {
        match self.store.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("⚠️ No se pudo contar los documentos: {e}");
                0
            }
        }
    }

    pub async fn query(&self, question: &str) -> QueryResult {
        info!("❓ Procesando: {question}");
        let intent = self.classifier.classify(question);
        debug!("🎯 Tipo de entrada: {intent}");

        if intent.is_template_only() {
            let document_count = self.document_count().await;
            let confidence = template_confidence(&intent);
            let answer = self.generator.generate(&ResponseContext {
                question,
                intent: &intent,
                confidence,
                documents: &[],
                document_count,
                lookup: None,
            });
            return QueryResult::bare(answer, confidence, intent.to_string(), vec![intent.to_string()]);
        }

        match self.engine.state().await {
            EngineState::Ready => {}
            EngineState::Loading => {
                return QueryResult::bare(LOADING.to_string(), Confidence::Loading, intent.to_string(), Vec::new());
            }
            EngineState::Failed(reason) => {
                warn!("⚠️ Consulta con el motor en fallo: {reason}");
                return QueryResult::bare(
                    PROCESSING_ERROR.to_string(),
                    Confidence::Error,
                    intent.to_string(),
                    Vec::new(),
                );
            }
        }

        let indexed = self.engine.indexed_metadata().await;
        if indexed.is_empty() && !intent.is_single() {
            return QueryResult::bare(
                NO_DOCUMENTS.to_string(),
                Confidence::NoDocuments,
                intent.to_string(),
                Vec::new(),
            );
        }

        let extraction = self.extractor.extract(question, &indexed);
        debug!(
            "🔍 Categorías={:?}, términos={:?}",
            extraction.categories, extraction.specific_terms
        );

        let retrieval = self.engine.find(question, &extraction).await;

        let lookup = if intent.is_single() && retrieval.confidence != Confidence::Error {
            match self.engine.lookup_word(question).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!("⚠️ Falló la búsqueda de palabra suelta: {e}");
                    None
                }
            }
        } else {
            None
        };

        let document_count = self.document_count().await;
        let answer = self.generator.generate(&ResponseContext {
            question,
            intent: &intent,
            confidence: retrieval.confidence,
            documents: &retrieval.documents,
            document_count,
            lookup: lookup.as_ref(),
        });

        let (matched_documents, similarity_scores) = retrieval
            .documents
            .into_iter()
            .map(|doc| {
                (
                    MatchedDocument {
                        doc_id: doc.metadata.doc_id,
                        title: doc.metadata.title,
                        category: doc.metadata.category,
                        text: doc.text,
                    },
                    doc.score,
                )
            })
            .unzip();

        QueryResult {
            answer,
            matched_documents,
            similarity_scores,
            confidence: retrieval.confidence,
            intent: intent.to_string(),
            intent_categories: extraction.categories,
            specific_terms: extraction.specific_terms,
        }
    }
}

#[async_trait]
impl Assistant for QaPipeline {
    async fn ask(&self, question: &str) -> QueryResult {
        self.query(question).await
    }
}
