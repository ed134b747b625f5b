//! Warm-then-query journeys against a real temporary store

use ember_core::{ContextLayer, EmberConfig, KnowledgeClient, KnowledgeType};
use ember_e2e_tests::harness::{StoreHarness, default_seed};

#[tokio::test]
async fn first_query_misses_then_session_hits() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();

    let first = engine
        .process_query("How do I implement CAG?", "S1", None)
        .await
        .unwrap();
    assert!(!first.performance.cache_hit);
    assert!(first.context_loaded);
    assert!(first.context_layers["system"]);
    assert!(first.context_layers["project"]);
    assert!(first.cached_knowledge_items > 0);

    let second = engine
        .process_query("How do I implement CAG?", "S1", None)
        .await
        .unwrap();
    assert!(second.performance.cache_hit);
    assert!(second.cached_knowledge_items >= first.cached_knowledge_items);

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.total_queries, 2);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.cache_hits, 1);
    assert!(metrics.average_response_time > 0.0);
}

#[tokio::test]
async fn empty_store_still_produces_valid_envelope() {
    let harness = StoreHarness::empty();
    let engine = harness.engine();

    let stats = engine.warm_cache_for_session("NEW_SESSION", None).await.unwrap();
    assert_eq!(stats.phases_completed, 4);
    // The write-back of previous tests cannot interfere: fresh store
    assert_eq!(stats.items_loaded, 0);
    assert!(stats.warming_time > 0.0);

    let envelope = engine.process_query("X", "NEW_SESSION", None).await.unwrap();
    assert!(envelope.context_loaded);
    assert!(envelope.context_layers["session"]);
    let session_at = envelope
        .full_context
        .find(&ContextLayer::Session.header())
        .unwrap();
    assert!(envelope.full_context[session_at..].contains("No session history found"));
}

#[tokio::test]
async fn session_transcript_flows_into_session_layer() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    harness.record_turn("S9", "how are budgets split", "each layer owns a fixed share");
    let engine = harness.engine();

    let envelope = engine.process_query("follow up", "S9", None).await.unwrap();
    assert!(envelope.full_context.contains("USER: how are budgets split"));
    assert!(envelope.full_context.contains("AI: each layer owns a fixed share"));
}

#[tokio::test]
async fn interaction_write_back_lands_in_store() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();
    engine
        .process_query("record this interaction", "S1", None)
        .await
        .unwrap();

    let stored = harness
        .client
        .search_knowledge("cag_interaction", None, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].knowledge_type, KnowledgeType::Contextual);
    assert!(stored[0].title.starts_with("CAG Query: record this interaction"));
    assert_eq!(stored[0].importance_score, Some(30));
}

#[tokio::test]
async fn warming_twice_leaves_cache_size_unchanged() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();

    let first = engine.warm_cache_for_session("S1", None).await.unwrap();
    let size_after_first = engine.cache().len();
    assert_eq!(first.cache_size, size_after_first);

    let second = engine.warm_cache_for_session("S1", None).await.unwrap();
    assert_eq!(engine.cache().len(), size_after_first);
    assert_eq!(second.items_loaded, first.items_loaded);
}

#[tokio::test]
async fn distinct_sessions_share_the_cache() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();

    engine.warm_cache_for_session("A", None).await.unwrap();
    let after_a = engine.cache().len();
    engine.warm_cache_for_session("B", None).await.unwrap();

    // Same store, same keys: the second session overwrites, never shrinks
    assert!(engine.cache().len() >= after_a);
}

#[tokio::test]
async fn every_cached_entry_clears_the_priority_gate() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let config = EmberConfig::direct("unused");
    let engine = harness.engine_with(config.clone());
    engine.warm_cache_for_session("S1", None).await.unwrap();

    for layer in ContextLayer::ALL {
        for (key, entry) in engine.get_cached_knowledge(Some(layer), 100).unwrap() {
            assert!(
                entry.priority >= config.cache_priority_threshold,
                "{key} admitted below threshold"
            );
            assert!(key.starts_with(layer.as_str()));
        }
    }
}
