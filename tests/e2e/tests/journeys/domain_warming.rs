//! Explicit domain warming pins matching items to the domain layer

use ember_core::{ContextLayer, EmberConfig, KnowledgeType};
use ember_e2e_tests::harness::{SeedItem, StoreHarness, default_seed};

#[tokio::test]
async fn domain_warming_pins_matching_items_only() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let config = EmberConfig::direct("unused");
    let engine = harness.engine_with(config.clone());

    let result = engine.warm_domain_cache("pgvector", "normal").await.unwrap();
    assert!(result.success);
    assert_eq!(result.priority, "normal");
    assert_eq!(result.items_loaded, 1);

    let domain = engine
        .get_cached_knowledge(Some(ContextLayer::Domain), 100)
        .unwrap();
    assert_eq!(domain.len(), 1);
    let (key, entry) = &domain[0];
    assert!(key.starts_with("domain:"));
    assert!(entry.content.contains("pgvector"));
    assert_eq!(entry.source_tag, "domain_warming");
    assert!(entry.priority >= config.cache_priority_threshold);

    // Nothing leaked into other layers
    for layer in [ContextLayer::Strategic, ContextLayer::Session, ContextLayer::Experience] {
        assert!(engine.get_cached_knowledge(Some(layer), 100).unwrap().is_empty());
    }
}

#[tokio::test]
async fn domain_warming_is_stable_under_repeats() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();

    engine.warm_domain_cache("pgvector", "normal").await.unwrap();
    let first_size = engine.cache().len();
    engine.warm_domain_cache("pgvector", "high").await.unwrap();

    // Same keys rewritten, no growth
    assert_eq!(engine.cache().len(), first_size);
}

#[tokio::test]
async fn title_mentions_do_not_qualify_for_domain_warming() {
    let seed = vec![SeedItem {
        knowledge_type: KnowledgeType::Factual,
        category: "misc",
        title: "pgvector primer",
        content: "General indexing notes without the keyword",
        importance: 50,
    }];
    let harness = StoreHarness::seeded(&seed).await;
    let engine = harness.engine();

    let result = engine.warm_domain_cache("pgvector", "normal").await.unwrap();
    assert!(result.success);
    assert_eq!(result.items_loaded, 0);
    assert!(
        engine
            .get_cached_knowledge(Some(ContextLayer::Domain), 100)
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn unmatched_domain_loads_nothing() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();

    let result = engine.warm_domain_cache("quaternion", "normal").await.unwrap();
    assert!(result.success);
    assert_eq!(result.items_loaded, 0);
    assert!(
        engine
            .get_cached_knowledge(Some(ContextLayer::Domain), 100)
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn summary_reflects_domain_warming() {
    let harness = StoreHarness::seeded(&default_seed()).await;
    let engine = harness.engine();
    engine.warm_domain_cache("pgvector", "normal").await.unwrap();

    let summary = engine
        .get_cached_knowledge_summary(Some(ContextLayer::Domain))
        .unwrap();
    assert_eq!(summary.total_cached_items, 1);
    assert_eq!(summary.cache_layers, 1);
    assert!(summary.average_priority > 0.0);
    assert_eq!(summary.sample_items.len(), 1);
    assert!(summary.sample_items[0].key.starts_with("domain:"));
}
