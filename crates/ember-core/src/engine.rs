//! CAG Engine
//!
//! Orchestrates the full pipeline per query: warm-once per session,
//! layered context assembly, metrics, and the best-effort interaction
//! write-back. Construction picks the knowledge client variant; that
//! choice also fixes the scoring mode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{CacheEntry, CacheWarmer, UserContext, WarmCache, WarmingStats};
use crate::client::{DirectStoreClient, HttpToolInvoker, KnowledgeClient, SearchScope, ToolClient};
use crate::config::{EmberConfig, StoreBackend};
use crate::context::{ContextManager, estimate_tokens};
use crate::error::{EmberError, Result};
use crate::knowledge::{ContextLayer, KnowledgeType};
use crate::metrics::PerformanceMetrics;

const DOMAIN_WARMING_LIMIT: usize = 10;
const SUMMARY_SAMPLE_LIMIT: usize = 5;

// ============================================================================
// RESULT ENVELOPES
// ============================================================================

/// Timing and cache outcome for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPerformance {
    /// Seconds spent assembling the context window
    pub context_load_time: f64,
    /// Seconds spent on the whole pipeline
    pub total_processing_time: f64,
    /// Whether the session cache was already warm when the query arrived
    pub cache_hit: bool,
}

/// Record returned by [`EmberEngine::process_query`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEnvelope {
    pub query: String,
    pub session_id: String,
    pub context_loaded: bool,
    pub context_size_tokens: usize,
    pub cached_knowledge_items: usize,
    pub performance: QueryPerformance,
    /// Layer name to whether its section was emitted
    pub context_layers: HashMap<String, bool>,
    pub full_context: String,
}

/// Outcome of an explicit domain warming request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainWarmingResult {
    pub domain: String,
    pub items_loaded: usize,
    pub priority: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One sampled cache entry in a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSample {
    pub key: String,
    pub title: String,
    pub knowledge_type: KnowledgeType,
    pub priority: f64,
    pub source_tag: String,
}

/// Cache totals plus a handful of sample entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSummary {
    pub total_cached_items: usize,
    pub cache_layers: usize,
    pub average_priority: f64,
    pub memory_usage_estimate: usize,
    pub sample_items: Vec<CacheSample>,
    pub performance_metrics: PerformanceMetrics,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The cache-augmented generation engine
pub struct EmberEngine {
    client: Arc<dyn KnowledgeClient>,
    cache: Arc<WarmCache>,
    warmer: CacheWarmer,
    context: ContextManager,
    metrics: Mutex<PerformanceMetrics>,
    project: String,
}

impl EmberEngine {
    /// Build the engine from configuration, constructing the client
    /// variant the backend selects
    pub fn from_config(config: &EmberConfig) -> Result<Self> {
        config.validate()?;
        let client: Arc<dyn KnowledgeClient> = match &config.backend {
            StoreBackend::Direct { path } => Arc::new(DirectStoreClient::open(path)?),
            StoreBackend::Tool { endpoint } => Arc::new(ToolClient::new(Arc::new(
                HttpToolInvoker::new(endpoint.clone()),
            ))),
        };
        Ok(Self::with_client(client, config))
    }

    /// Build the engine around an already-constructed client
    pub fn with_client(client: Arc<dyn KnowledgeClient>, config: &EmberConfig) -> Self {
        let cache = Arc::new(WarmCache::new(
            config.cache_priority_threshold,
            config.max_cache_items,
        ));
        let warmer = CacheWarmer::new(client.clone(), cache.clone(), config.project.clone());
        let context = ContextManager::new(
            client.clone(),
            config.max_context_tokens,
            config.project.clone(),
        );
        Self {
            client,
            cache,
            warmer,
            context,
            metrics: Mutex::new(PerformanceMetrics::default()),
            project: config.project.clone(),
        }
    }

    /// Enable the pattern-prediction warming phase
    pub fn with_pattern_prediction(mut self, enabled: bool) -> Self {
        self.warmer = self.warmer.with_pattern_prediction(enabled);
        self
    }

    pub fn cache(&self) -> &Arc<WarmCache> {
        &self.cache
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Process one query through the full pipeline
    pub async fn process_query(
        &self,
        query: &str,
        session_id: &str,
        user_context: Option<UserContext>,
    ) -> Result<QueryEnvelope> {
        let start = Instant::now();

        // A hit means the session cache was warm before this query.
        let cache_hit = self.warmer.is_session_warmed(session_id)?;
        let warming = self
            .warmer
            .warm_cache_for_session(session_id, user_context)
            .await?;
        if !cache_hit {
            info!(
                session_id,
                items = warming.items_loaded,
                "session cache warmed"
            );
        }

        let context_start = Instant::now();
        let full_context = self.context.load_context_for_query(query, session_id).await;
        let context_load_time = context_start.elapsed().as_secs_f64();

        let context_size_tokens = estimate_tokens(&full_context);
        let cached_knowledge_items = self.cache.len();
        let total_processing_time = start.elapsed().as_secs_f64();

        let context_layers: HashMap<String, bool> = ContextLayer::ALL
            .iter()
            .map(|layer| {
                (
                    layer.as_str().to_string(),
                    full_context.contains(&layer.header()),
                )
            })
            .collect();

        let envelope = QueryEnvelope {
            query: query.to_string(),
            session_id: session_id.to_string(),
            context_loaded: true,
            context_size_tokens,
            cached_knowledge_items,
            performance: QueryPerformance {
                context_load_time,
                total_processing_time,
                cache_hit,
            },
            context_layers,
            full_context,
        };

        {
            let mut metrics = self
                .metrics
                .lock()
                .map_err(|_| EmberError::State("metrics lock poisoned".into()))?;
            metrics.record_query(cache_hit, total_processing_time);
            metrics.tool_calls = self.client.tool_calls();
        }

        self.store_interaction(&envelope).await;

        Ok(envelope)
    }

    /// Best-effort interaction write-back; failures are logged, never
    /// propagated
    async fn store_interaction(&self, envelope: &QueryEnvelope) {
        let title = format!(
            "CAG Query: {}...",
            envelope.query.chars().take(50).collect::<String>()
        );
        let content = format!(
            "Query: {}\nProcessing time: {:.2}s\nContext tokens: {}",
            envelope.query,
            envelope.performance.total_processing_time,
            envelope.context_size_tokens
        );
        if let Err(e) = self
            .client
            .store_knowledge(
                KnowledgeType::Contextual,
                &title,
                &content,
                Some("cag_interaction"),
                Some(30),
            )
            .await
        {
            warn!(error = %e, "failed to store interaction knowledge");
        }
    }

    /// Warm the cache for one domain, pinning entries to the domain layer
    pub async fn warm_domain_cache(
        &self,
        domain: &str,
        priority: &str,
    ) -> Result<DomainWarmingResult> {
        info!(domain, "warming domain cache");
        // Items qualify by category or content; a title mention alone
        // does not make an item part of the domain.
        match self
            .client
            .search_knowledge_scoped(
                domain,
                SearchScope::ContentOrCategory,
                None,
                DOMAIN_WARMING_LIMIT,
            )
            .await
        {
            Ok(items) => {
                let candidates =
                    self.warmer
                        .pinned_candidates(items, ContextLayer::Domain, "domain_warming");
                self.warmer.preload(&candidates)?;
                Ok(DomainWarmingResult {
                    domain: domain.to_string(),
                    items_loaded: candidates.len(),
                    priority: priority.to_string(),
                    success: true,
                    error: None,
                })
            }
            Err(e) => Ok(DomainWarmingResult {
                domain: domain.to_string(),
                items_loaded: 0,
                priority: priority.to_string(),
                success: false,
                error: Some(e.to_string()),
            }),
        }
    }

    /// Warm the cache for a session without processing a query
    pub async fn warm_cache_for_session(
        &self,
        session_id: &str,
        user_context: Option<UserContext>,
    ) -> Result<WarmingStats> {
        self.warmer.warm_cache_for_session(session_id, user_context).await
    }

    /// Cached entries, optionally restricted to one layer
    pub fn get_cached_knowledge(
        &self,
        layer: Option<ContextLayer>,
        limit: usize,
    ) -> Result<Vec<(String, CacheEntry)>> {
        self.cache.top_entries(layer, limit)
    }

    /// Cache totals, sample entries, and the metrics snapshot
    pub fn get_cached_knowledge_summary(
        &self,
        layer: Option<ContextLayer>,
    ) -> Result<CacheSummary> {
        let stats = self.cache.stats()?;
        let sample_items = self
            .cache
            .top_entries(layer, SUMMARY_SAMPLE_LIMIT)?
            .into_iter()
            .map(|(key, entry)| CacheSample {
                key,
                title: entry.title,
                knowledge_type: entry.knowledge_type,
                priority: entry.priority,
                source_tag: entry.source_tag,
            })
            .collect();
        Ok(CacheSummary {
            total_cached_items: stats.total_items,
            cache_layers: stats.cache_layers,
            average_priority: stats.average_priority,
            memory_usage_estimate: stats.memory_usage_estimate,
            sample_items,
            performance_metrics: self.metrics()?,
        })
    }

    /// Snapshot of the engine metrics
    pub fn metrics(&self) -> Result<PerformanceMetrics> {
        let mut metrics = self
            .metrics
            .lock()
            .map_err(|_| EmberError::State("metrics lock poisoned".into()))?
            .clone();
        metrics.tool_calls = self.client.tool_calls();
        Ok(metrics)
    }

    /// Drop every cached entry; the warming registry is untouched
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }
}

// ============================================================================
// TESTS
// ============================================================================
