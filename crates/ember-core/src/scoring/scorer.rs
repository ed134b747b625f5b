//! Cache Priority Scorer
//!
//! Weighted composite over recency, type weight, and either strategic
//! value + access frequency (direct mode) or importance (tool mode).
//! Total over any legal item; result clamped to [0,1].

use chrono::{DateTime, Utc};

use crate::client::ClientMode;
use crate::knowledge::{KnowledgeItem, KnowledgeType};

/// Recency decays linearly to zero over this many days
const RECENCY_WINDOW_DAYS: f64 = 30.0;

/// Access counts saturate at this many accesses
const FREQUENCY_CEILING: f64 = 10.0;

const DEFAULT_IMPORTANCE: i64 = 50;
const DEFAULT_ACCESS_COUNT: i64 = 1;

// ============================================================================
// WEIGHT TABLES
// ============================================================================

/// Fixed per-type weight used by both scoring modes
pub fn type_weight(knowledge_type: KnowledgeType) -> f64 {
    match knowledge_type {
        KnowledgeType::Procedural => 0.9,
        KnowledgeType::TechnicalDiscovery => 0.8,
        KnowledgeType::Experiential => 0.7,
        KnowledgeType::Contextual => 0.6,
        KnowledgeType::Factual => 0.5,
        KnowledgeType::Relational => 0.4,
        KnowledgeType::PatternRecognition => 0.5,
    }
}

/// Estimated strategic value per type (direct mode only)
pub fn strategic_value(knowledge_type: KnowledgeType) -> f64 {
    match knowledge_type {
        KnowledgeType::TechnicalDiscovery => 0.9,
        KnowledgeType::Procedural => 0.8,
        KnowledgeType::Experiential => 0.7,
        KnowledgeType::Contextual => 0.6,
        KnowledgeType::Factual => 0.5,
        KnowledgeType::Relational => 0.4,
        KnowledgeType::PatternRecognition => 0.5,
    }
}

// ============================================================================
// SCORER
// ============================================================================

/// Which composite formula to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// `0.3·recency + 0.25·strategic + 0.25·frequency + 0.2·type_weight`
    Direct,
    /// `0.4·importance + 0.3·type_weight + 0.3·recency`
    Tool,
}

impl From<ClientMode> for ScoringMode {
    fn from(mode: ClientMode) -> Self {
        match mode {
            ClientMode::Direct => ScoringMode::Direct,
            ClientMode::Tool => ScoringMode::Tool,
        }
    }
}

/// Pure item-to-priority function
#[derive(Debug, Clone, Copy)]
pub struct PriorityScorer {
    mode: ScoringMode,
}

impl PriorityScorer {
    pub fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    /// Compute the cache priority of `item` as of `now`
    ///
    /// Missing `created_at` counts as brand new (recency 1); missing
    /// `importance_score` defaults to 50, missing `access_count` to 1.
    pub fn score(&self, item: &KnowledgeItem, now: DateTime<Utc>) -> f64 {
        let recency = recency_factor(item.created_at, now);
        let weight = type_weight(item.knowledge_type);

        let score = match self.mode {
            ScoringMode::Direct => {
                let strategic = strategic_value(item.knowledge_type);
                let access = item.access_count.unwrap_or(DEFAULT_ACCESS_COUNT) as f64;
                let frequency = (access / FREQUENCY_CEILING).min(1.0);
                0.3 * recency + 0.25 * strategic + 0.25 * frequency + 0.2 * weight
            }
            ScoringMode::Tool => {
                let importance = item.importance_score.unwrap_or(DEFAULT_IMPORTANCE) as f64;
                let importance = (importance / 100.0).clamp(0.0, 1.0);
                0.4 * importance + 0.3 * weight + 0.3 * recency
            }
        };

        score.clamp(0.0, 1.0)
    }
}

fn recency_factor(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(created_at) = created_at else {
        return 1.0;
    };
    let age_days = (now - created_at).num_days().max(0) as f64;
    (1.0 - age_days / RECENCY_WINDOW_DAYS).max(0.0)
}

// ============================================================================
// TESTS
// ============================================================================
