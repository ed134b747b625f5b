//! Layer Classifier
//!
//! Maps a knowledge item to the cache layer it belongs in. First match
//! wins; the importance escalation rule applies in tool mode only.

use crate::knowledge::{ContextLayer, KnowledgeItem, KnowledgeType};

use super::ScoringMode;

/// Importance above which tool-mode items escalate to the strategic layer
const STRATEGIC_IMPORTANCE_FLOOR: i64 = 80;

/// Pure item-to-layer function
#[derive(Debug, Clone, Copy)]
pub struct LayerClassifier {
    mode: ScoringMode,
}

impl LayerClassifier {
    pub fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }

    pub fn classify(&self, item: &KnowledgeItem) -> ContextLayer {
        if self.mode == ScoringMode::Tool
            && item.importance_score.unwrap_or(50) > STRATEGIC_IMPORTANCE_FLOOR
        {
            return ContextLayer::Strategic;
        }

        match item.knowledge_type {
            KnowledgeType::Procedural | KnowledgeType::TechnicalDiscovery => ContextLayer::Domain,
            KnowledgeType::Experiential => ContextLayer::Experience,
            KnowledgeType::Contextual => ContextLayer::Session,
            _ => ContextLayer::Dynamic,
        }
    }
}
