//! Cache Warming Engine
//!
//! Phased loader that fills the warm cache at session startup:
//!
//! 1. Core knowledge (critical path)
//! 2. Session prediction from user context (critical path)
//! 3. Pattern-predicted knowledge (background, stub predictor)
//! 4. Strategic insights (background)
//!
//! Each phase is independently guarded: a failing phase contributes zero
//! items and the remaining phases still run. Warming is idempotent per
//! session through the warming registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{ClientError, ClientMode, KnowledgeClient, SearchScope};
use crate::error::{EmberError, Result};
use crate::knowledge::{ContextLayer, KnowledgeItem, KnowledgeType};
use crate::scoring::{LayerClassifier, PriorityScorer, ScoringMode};

use super::{CacheEntry, WarmCache};

/// Situation string for tool-mode core warming
const CORE_WARMING_SITUATION: &str = "CAG core knowledge warming - essential system knowledge";

/// Confidence attached to pattern-predicted entries by the stub predictor
const PREDICTION_CONFIDENCE: f64 = 0.7;

/// Tool-mode strategic phases only keep items above this importance
const MIN_STRATEGIC_IMPORTANCE: i64 = 60;

const CORE_LIMIT: usize = 20;
const SESSION_LIMIT: usize = 15;
const SESSION_FALLBACK_LIMIT: usize = 10;
const PATTERN_LIMIT: usize = 5;
const STRATEGIC_LIMIT: usize = 8;

// ============================================================================
// WARMING RECORDS
// ============================================================================

/// Caller-supplied hints about the upcoming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub keywords: Vec<String>,
    pub project: String,
}

impl UserContext {
    /// Default context when the caller supplies none
    pub fn default_for(project: &str) -> Self {
        Self {
            keywords: vec!["CAG".to_string(), "implementation".to_string()],
            project: project.to_string(),
        }
    }
}

/// Outcome of one warming run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmingStats {
    /// Phases attempted, failures included
    pub phases_completed: u32,
    /// Items fetched by phases that succeeded
    pub items_loaded: usize,
    /// Cache size after the run
    pub cache_size: usize,
    /// Wall-clock seconds spent warming
    pub warming_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_integrated: Option<bool>,
}

/// Per-session entry in the warming registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWarmingRecord {
    pub warmed_at: DateTime<Utc>,
    pub stats: WarmingStats,
}

/// A scored, classified item ready for preloading
pub(crate) struct Candidate {
    pub item: KnowledgeItem,
    pub layer: ContextLayer,
    pub priority: f64,
    pub source_tag: String,
}

// ============================================================================
// CACHE WARMER
// ============================================================================

/// Phased cache loader with a per-session warming registry
pub struct CacheWarmer {
    client: Arc<dyn KnowledgeClient>,
    cache: Arc<WarmCache>,
    scorer: PriorityScorer,
    classifier: LayerClassifier,
    registry: Mutex<HashMap<String, SessionWarmingRecord>>,
    default_project: String,
    pattern_prediction: bool,
}

impl CacheWarmer {
    pub fn new(
        client: Arc<dyn KnowledgeClient>,
        cache: Arc<WarmCache>,
        default_project: impl Into<String>,
    ) -> Self {
        let mode = ScoringMode::from(client.mode());
        Self {
            client,
            cache,
            scorer: PriorityScorer::new(mode),
            classifier: LayerClassifier::new(mode),
            registry: Mutex::new(HashMap::new()),
            default_project: default_project.into(),
            pattern_prediction: false,
        }
    }

    /// Enable the pattern predictor (stub: recent experiential items)
    pub fn with_pattern_prediction(mut self, enabled: bool) -> Self {
        self.pattern_prediction = enabled;
        self
    }

    pub fn scorer(&self) -> &PriorityScorer {
        &self.scorer
    }

    /// Whether this session already went through a warming run
    pub fn is_session_warmed(&self, session_id: &str) -> Result<bool> {
        Ok(self.warming_record(session_id)?.is_some())
    }

    pub fn warming_record(&self, session_id: &str) -> Result<Option<SessionWarmingRecord>> {
        let registry = self
            .registry
            .lock()
            .map_err(|_| EmberError::State("warming registry lock poisoned".into()))?;
        Ok(registry.get(session_id).cloned())
    }

    /// Warm the cache for a session; repeated calls short-circuit
    pub async fn warm_cache_for_session(
        &self,
        session_id: &str,
        user_context: Option<UserContext>,
    ) -> Result<WarmingStats> {
        if let Some(record) = self.warming_record(session_id)? {
            debug!(session_id, "cache already warmed, skipping");
            return Ok(record.stats);
        }

        let context =
            user_context.unwrap_or_else(|| UserContext::default_for(&self.default_project));
        let start = Instant::now();
        let mut stats = WarmingStats {
            phases_completed: 0,
            items_loaded: 0,
            cache_size: 0,
            warming_time: 0.0,
            mcp_integrated: match self.client.mode() {
                ClientMode::Tool => Some(true),
                ClientMode::Direct => None,
            },
        };

        // Phases 1 and 2 are the critical path.
        let core = self.load_core_knowledge().await;
        self.absorb_phase(1, core, &mut stats)?;

        let session = self.predict_session_knowledge(&context).await;
        self.absorb_phase(2, session, &mut stats)?;

        // Phases 3 and 4 run concurrently, joined before returning so the
        // tallies stay accurate.
        let (predicted, strategic) = tokio::join!(
            self.pattern_predict_knowledge(session_id),
            self.load_strategic_insights(),
        );
        self.absorb_phase(3, predicted, &mut stats)?;
        self.absorb_phase(4, strategic, &mut stats)?;

        stats.cache_size = self.cache.len();
        stats.warming_time = start.elapsed().as_secs_f64();
        info!(
            session_id,
            items = stats.items_loaded,
            cache_size = stats.cache_size,
            "cache warming complete"
        );

        let record = SessionWarmingRecord {
            warmed_at: Utc::now(),
            stats: stats.clone(),
        };
        self.registry
            .lock()
            .map_err(|_| EmberError::State("warming registry lock poisoned".into()))?
            .insert(session_id.to_string(), record);

        Ok(stats)
    }

    /// Fold one phase outcome into the running stats
    fn absorb_phase(
        &self,
        phase: u32,
        outcome: std::result::Result<Vec<Candidate>, ClientError>,
        stats: &mut WarmingStats,
    ) -> Result<()> {
        stats.phases_completed += 1;
        match outcome {
            Ok(candidates) => {
                stats.items_loaded += candidates.len();
                let inserted = self.preload(&candidates)?;
                debug!(phase, fetched = candidates.len(), inserted, "warming phase done");
            }
            Err(e) => warn!(phase, error = %e, "warming phase degraded to empty"),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    /// Phase 1: knowledge that should always be resident
    async fn load_core_knowledge(&self) -> std::result::Result<Vec<Candidate>, ClientError> {
        let items = match self.client.mode() {
            ClientMode::Direct => {
                self.client
                    .search_knowledge(
                        "",
                        Some(&[
                            KnowledgeType::Procedural,
                            KnowledgeType::TechnicalDiscovery,
                            KnowledgeType::Experiential,
                        ]),
                        CORE_LIMIT,
                    )
                    .await?
            }
            ClientMode::Tool => {
                self.client
                    .get_contextual_knowledge(CORE_WARMING_SITUATION, CORE_LIMIT)
                    .await?
            }
        };
        Ok(self.classified_candidates(items, "core_knowledge"))
    }

    /// Phase 2: knowledge predicted from the user context
    async fn predict_session_knowledge(
        &self,
        context: &UserContext,
    ) -> std::result::Result<Vec<Candidate>, ClientError> {
        let items = match self.client.mode() {
            ClientMode::Direct => {
                if context.keywords.is_empty() {
                    self.client
                        .search_knowledge("", None, SESSION_FALLBACK_LIMIT)
                        .await?
                } else {
                    // One search per needle, merged and deduplicated by
                    // id, newest first. Keywords match content or
                    // category; the project matches category only.
                    let mut merged: Vec<KnowledgeItem> = Vec::new();
                    let needles = context
                        .keywords
                        .iter()
                        .map(|kw| (kw, SearchScope::ContentOrCategory))
                        .chain([(&context.project, SearchScope::Category)]);
                    for (needle, scope) in needles {
                        let batch = self
                            .client
                            .search_knowledge_scoped(needle, scope, None, SESSION_LIMIT)
                            .await?;
                        for item in batch {
                            if !merged.iter().any(|m| m.id == item.id) {
                                merged.push(item);
                            }
                        }
                    }
                    let far_future = Utc::now() + chrono::Duration::days(3650);
                    merged.sort_by_key(|i| std::cmp::Reverse(i.created_at.unwrap_or(far_future)));
                    merged.truncate(SESSION_LIMIT);
                    merged
                }
            }
            ClientMode::Tool => {
                let query = format!("{} {}", context.project, context.keywords.join(" "));
                self.client
                    .search_knowledge(query.trim(), None, SESSION_LIMIT)
                    .await?
            }
        };
        Ok(self.classified_candidates(items, "session_prediction"))
    }

    /// Phase 3: pattern-predicted knowledge
    ///
    /// The predictor is a stub: recent experiential items tagged with a
    /// fixed confidence. A real predictor can replace this without
    /// touching any other component.
    async fn pattern_predict_knowledge(
        &self,
        _session_id: &str,
    ) -> std::result::Result<Vec<Candidate>, ClientError> {
        if !self.pattern_prediction {
            return Ok(Vec::new());
        }
        let items = self
            .client
            .search_knowledge("", Some(&[KnowledgeType::Experiential]), PATTERN_LIMIT)
            .await?;
        let tag = format!("pattern_prediction(confidence={PREDICTION_CONFIDENCE:.2})");
        Ok(self.pinned_candidates(items, ContextLayer::Experience, &tag))
    }

    /// Phase 4: strategic insights, pinned to the strategic layer
    async fn load_strategic_insights(&self) -> std::result::Result<Vec<Candidate>, ClientError> {
        let types = [KnowledgeType::Procedural, KnowledgeType::TechnicalDiscovery];
        let mut items = match self.client.mode() {
            ClientMode::Direct => {
                self.client
                    .search_knowledge("", Some(&types), STRATEGIC_LIMIT)
                    .await?
            }
            ClientMode::Tool => {
                self.client
                    .search_knowledge(
                        "strategic insights architecture implementation",
                        Some(&types),
                        STRATEGIC_LIMIT,
                    )
                    .await?
            }
        };
        if self.client.mode() == ClientMode::Tool {
            items.retain(|i| i.importance_score.unwrap_or(0) > MIN_STRATEGIC_IMPORTANCE);
        }
        Ok(self.pinned_candidates(items, ContextLayer::Strategic, "strategic_insights"))
    }

    // ------------------------------------------------------------------
    // Candidate handling
    // ------------------------------------------------------------------

    /// Score and classify items, best priority first
    pub(crate) fn classified_candidates(
        &self,
        items: Vec<KnowledgeItem>,
        source_tag: &str,
    ) -> Vec<Candidate> {
        let now = Utc::now();
        let mut candidates: Vec<Candidate> = items
            .into_iter()
            .map(|item| Candidate {
                layer: self.classifier.classify(&item),
                priority: self.scorer.score(&item, now),
                source_tag: source_tag.to_string(),
                item,
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// Score items but pin them all to one layer
    pub(crate) fn pinned_candidates(
        &self,
        items: Vec<KnowledgeItem>,
        layer: ContextLayer,
        source_tag: &str,
    ) -> Vec<Candidate> {
        let now = Utc::now();
        items
            .into_iter()
            .map(|item| Candidate {
                layer,
                priority: self.scorer.score(&item, now),
                source_tag: source_tag.to_string(),
                item,
            })
            .collect()
    }

    /// Insert candidates that clear the priority gate; returns how many
    /// were stored
    pub(crate) fn preload(&self, candidates: &[Candidate]) -> Result<usize> {
        let mut inserted = 0;
        for candidate in candidates {
            let entry = CacheEntry {
                content: candidate.item.content.clone(),
                title: candidate.item.title.clone(),
                knowledge_type: candidate.item.knowledge_type,
                priority: candidate.priority,
                loaded_at: Utc::now(),
                source_tag: candidate.source_tag.clone(),
                access_count: 0,
            };
            if self.cache.insert(candidate.layer, &candidate.item.id, entry)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

// ============================================================================
// TESTS
// ============================================================================
