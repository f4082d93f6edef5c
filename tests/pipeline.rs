mod common;

use common::{Fixture, DEPOT_DOC, ETCS_DOC};
use railadvice_assistant::classifier::InputClassifier;
use railadvice_assistant::memory::{ConversationMemory, ConversationalAssistant};
use railadvice_assistant::models::Confidence;
use railadvice_assistant::pipeline::{Assistant, QaPipeline};
use railadvice_assistant::response::{FAREWELL, LOADING, NO_DOCUMENTS, PROCESSING_ERROR};

fn pipeline(fx: &Fixture) -> QaPipeline {
    QaPipeline::new(fx.engine.clone(), fx.store_dyn())
}

#[tokio::test]
async fn empty_knowledge_base_asks_for_documents() {
    let fx = Fixture::new().await;
    fx.reload().await;

    let result = pipeline(&fx).query("Hva er ETCS?").await;
    assert_eq!(result.confidence, Confidence::NoDocuments);
    assert_eq!(result.answer, NO_DOCUMENTS);
    assert_eq!(result.sources(), 0);
}

#[tokio::test]
async fn greeting_reports_document_count() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.add("Lodalen verksted", "prosjekt", DEPOT_DOC).await;
    fx.reload().await;

    let result = pipeline(&fx).query("hei").await;
    assert_eq!(result.intent, "greeting");
    assert_eq!(result.confidence, Confidence::Greeting);
    assert_eq!(result.intent_categories, vec!["greeting"]);
    assert_eq!(result.sources(), 0);
    assert!(result.answer.contains("2 dokumenter"));
}

#[tokio::test]
async fn farewell_classifier_can_be_plugged_in() {
    let fx = Fixture::new().await;
    fx.reload().await;

    let plain = pipeline(&fx).query("takk for hjelpen").await;
    assert_ne!(plain.confidence, Confidence::Farewell);

    let with_farewell = pipeline(&fx).with_classifier(InputClassifier::new(true));
    let result = with_farewell.query("takk for hjelpen").await;
    assert_eq!(result.confidence, Confidence::Farewell);
    assert_eq!(result.answer, FAREWELL);
}

#[tokio::test]
async fn greeting_works_before_the_engine_is_ready() {
    let fx = Fixture::new().await;
    let p = pipeline(&fx);

    assert_eq!(p.query("hvem er du?").await.confidence, Confidence::Identity);
    let loading = p.query("Hva er ETCS?").await;
    assert_eq!(loading.confidence, Confidence::Loading);
    assert_eq!(loading.answer, LOADING);
}

#[tokio::test]
async fn question_is_answered_from_the_best_document() {
    let fx = Fixture::new().await;
    fx.add("Lodalen verksted", "prosjekt", DEPOT_DOC).await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    let result = pipeline(&fx).query("Hva er ETCS Level 2?").await;
    assert_eq!(result.intent, "question");
    assert_eq!(result.matched_documents[0].title, "ETCS Level 2");
    assert_eq!(result.similarity_scores.len(), result.sources());
    assert!(result.intent_categories.contains(&"teknologi".to_string()));
    assert!(result.specific_terms.contains(&"etcs".to_string()));
    assert!(result.confidence.level().is_some());
    assert!(result.answer.ends_with(['.', '!', '?']));
}

#[tokio::test]
async fn single_keyword_without_match_gets_category_prompt() {
    let fx = Fixture::new().await;
    fx.add("Lodalen verksted", "prosjekt", DEPOT_DOC).await;
    fx.reload().await;

    let result = pipeline(&fx).query("budget").await;
    assert_eq!(result.intent, "single_keyword_kostnad");
    assert!(result.answer.starts_with("Du spør om kostnader og økonomi."));
}

#[tokio::test]
async fn single_word_with_match_quotes_the_document() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    let result = pipeline(&fx).query("RBC").await;
    assert_eq!(result.intent, "single_word");
    assert!(result.answer.starts_with("Angående 'RBC':"));
    assert!(result.answer.ends_with("Ønsker du mer informasjon?"));
}

#[tokio::test]
async fn embedding_outage_is_reported_not_raised() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;
    fx.embedder.fail();

    let result = pipeline(&fx).query("Hva er ETCS Level 2?").await;
    assert_eq!(result.confidence, Confidence::Error);
    assert_eq!(result.answer, PROCESSING_ERROR);
    assert_eq!(result.sources(), 0);
}

#[tokio::test]
async fn conversational_wrapper_handles_farewell_and_persists() {
    let fx = Fixture::new().await;
    fx.reload().await;
    let path = fx.dir.path().join("conversation_memory.json");
    let assistant = ConversationalAssistant::new(pipeline(&fx), ConversationMemory::load(&path));

    let greeting = assistant.ask("hei").await;
    assert_eq!(greeting.confidence, Confidence::Greeting);

    let farewell = assistant.ask("takk for hjelpen, ha det").await;
    assert_eq!(farewell.answer, FAREWELL);

    let history = assistant.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].ai, FAREWELL);
    assert!(path.exists());
}
