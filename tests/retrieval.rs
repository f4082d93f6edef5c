mod common;

use common::{Fixture, DEPOT_DOC, ETCS_DOC};
use railadvice_assistant::keywords::KeywordExtractor;
use railadvice_assistant::models::Confidence;
use railadvice_assistant::retrieval::EngineState;
use tokio_test::assert_ok;

#[tokio::test]
async fn engine_starts_loading_and_becomes_ready() {
    let fx = Fixture::new().await;
    assert_eq!(fx.engine.state().await, EngineState::Loading);

    let retrieval = fx.engine.find("Hva er ETCS?", &Default::default()).await;
    assert_eq!(retrieval.confidence, Confidence::Loading);

    fx.reload().await;
    assert_eq!(fx.engine.state().await, EngineState::Ready);
}

#[tokio::test]
async fn nothing_indexed_means_no_documents() {
    let fx = Fixture::new().await;
    fx.reload().await;
    let retrieval = fx.engine.find("Hva er ETCS?", &Default::default()).await;
    assert_eq!(retrieval.confidence, Confidence::NoDocuments);
    assert!(retrieval.documents.is_empty());
}

#[tokio::test]
async fn title_match_ranks_first() {
    let fx = Fixture::new().await;
    fx.add("Lodalen verksted", "prosjekt", DEPOT_DOC).await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    let question = "Hva er ETCS Level 2?";
    let extraction = KeywordExtractor::default().extract(question, &fx.engine.indexed_metadata().await);
    let retrieval = fx.engine.find(question, &extraction).await;

    assert_eq!(retrieval.documents.len(), 2);
    assert_eq!(retrieval.documents[0].metadata.title, "ETCS Level 2");
    assert!(retrieval.documents[0].score > retrieval.documents[1].score);
    assert!(retrieval.confidence.level().is_some());
}

#[tokio::test]
async fn empty_question_is_low_not_an_error() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    let retrieval = assert_ok!(fx.engine.try_find("", &Default::default()).await);
    assert_eq!(retrieval.confidence, Confidence::Low);
    assert!(retrieval.documents.is_empty());
}

#[tokio::test]
async fn embedding_failure_becomes_error_label() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    fx.embedder.fail();
    let retrieval = fx.engine.find("Hva er ETCS?", &Default::default()).await;
    assert_eq!(retrieval.confidence, Confidence::Error);
    assert!(retrieval.documents.is_empty());
}

#[tokio::test]
async fn failed_documents_are_counted_not_fatal() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.embedder.fail();

    let summary = assert_ok!(fx.engine.reload(fx.store.as_ref(), |_, _| {}).await);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(fx.engine.indexed_count().await, 0);
    assert_eq!(fx.engine.state().await, EngineState::Ready);
}

#[tokio::test]
async fn forget_purges_index_and_metadata() {
    use railadvice_assistant::document_store::DocumentStore;

    let fx = Fixture::new().await;
    let etcs = fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.add("Lodalen verksted", "prosjekt", DEPOT_DOC).await;
    fx.reload().await;

    assert!(assert_ok!(fx.store.remove(&etcs.id).await));
    assert!(assert_ok!(fx.engine.forget(&etcs.id).await));

    assert!(assert_ok!(fx.store.get(&etcs.id).await).is_none());
    let indexed = fx.engine.indexed_metadata().await;
    assert!(indexed.iter().all(|m| m.doc_id != etcs.id));

    let retrieval = fx.engine.find("ETCS Level 2 radio", &Default::default()).await;
    assert!(retrieval.documents.iter().all(|d| d.metadata.doc_id != etcs.id));
}

#[tokio::test]
async fn single_word_lookup_quotes_a_sentence() {
    let fx = Fixture::new().await;
    fx.add("ETCS Level 2", "teknologi", ETCS_DOC).await;
    fx.reload().await;

    let hit = assert_ok!(fx.engine.lookup_word("RBC").await).expect("treff");
    assert!(hit.sentence.contains("RBC"));
    assert!(hit.sentence.chars().count() <= 203);
}
