//! Degraded-client behavior: every layer and phase guards its fetch

use std::sync::Arc;

use ember_core::{ClientError, ContextLayer, EmberConfig, EmberEngine, ToolClient};
use ember_e2e_tests::mocks::RegistryMock;

fn engine_over(mock: Arc<RegistryMock>) -> EmberEngine {
    let client = Arc::new(ToolClient::new(mock));
    EmberEngine::with_client(client, &EmberConfig::tool("http://unused"))
}

#[tokio::test]
async fn unreachable_registry_degrades_to_diagnostics() {
    let mock = Arc::new(RegistryMock::failing(ClientError::Transient(
        "registry unreachable".into(),
    )));
    let engine = engine_over(mock);

    let envelope = engine.process_query("anything", "S1", None).await.unwrap();
    assert!(envelope.context_loaded);
    assert_eq!(envelope.cached_knowledge_items, 0);

    for label in ["Project", "Session", "Domain", "Experience", "Strategic"] {
        assert!(
            envelope
                .full_context
                .contains(&format!("{label} unavailable: registry unreachable")),
            "missing diagnostic for {label}"
        );
    }
    // The system layer needs no client and stays intact
    assert!(envelope.full_context.starts_with(&ContextLayer::System.header()));
}

#[tokio::test]
async fn failed_warming_counts_phases_but_loads_nothing() {
    let mock = Arc::new(RegistryMock::failing(ClientError::Transient(
        "registry unreachable".into(),
    )));
    let engine = engine_over(mock);

    let stats = engine.warm_cache_for_session("S1", None).await.unwrap();
    assert_eq!(stats.phases_completed, 4);
    assert_eq!(stats.items_loaded, 0);
    assert_eq!(stats.cache_size, 0);
    assert!(stats.warming_time > 0.0);
}

#[tokio::test]
async fn write_back_failure_never_fails_the_query() {
    let mock = Arc::new(RegistryMock::failing(ClientError::Permanent(
        "store rejected".into(),
    )));
    let engine = engine_over(mock.clone());

    // store_knowledge fails along with everything else; the query still
    // returns a full envelope.
    let envelope = engine.process_query("anything", "S1", None).await.unwrap();
    assert!(envelope.context_loaded);
    assert_eq!(mock.invocation_count("store_knowledge"), 1);
}

#[tokio::test]
async fn queries_keep_flowing_after_failures() {
    let mock = Arc::new(RegistryMock::failing(ClientError::Transient(
        "registry unreachable".into(),
    )));
    let engine = engine_over(mock);

    engine.process_query("first", "S1", None).await.unwrap();
    let second = engine.process_query("second", "S1", None).await.unwrap();

    // The failed warming run still registered the session
    assert!(second.performance.cache_hit);
    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.total_queries, 2);
    assert_eq!(metrics.cache_hits, 1);
}
