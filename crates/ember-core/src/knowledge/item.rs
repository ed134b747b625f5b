//! Knowledge Item - The unit of cached content
//!
//! Items arrive from either client variant with a guaranteed core of
//! fields (`id`, `title`, `content`, `knowledge_type`) plus optional
//! provenance and ranking metadata. Unknown fields on ingest are
//! discarded; unknown type tags coerce to `factual`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// KNOWLEDGE TYPES
// ============================================================================

/// Closed set of knowledge type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KnowledgeType {
    /// A discrete fact or piece of information
    #[default]
    Factual,
    /// A procedure or how-to knowledge
    Procedural,
    /// Session- or situation-bound knowledge
    Contextual,
    /// A relationship between entities
    Relational,
    /// Experience gained from past work
    Experiential,
    /// A technical finding worth keeping
    TechnicalDiscovery,
    /// A recognized recurring pattern
    PatternRecognition,
}

impl KnowledgeType {
    /// Convert to the wire string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeType::Factual => "factual",
            KnowledgeType::Procedural => "procedural",
            KnowledgeType::Contextual => "contextual",
            KnowledgeType::Relational => "relational",
            KnowledgeType::Experiential => "experiential",
            KnowledgeType::TechnicalDiscovery => "technical_discovery",
            KnowledgeType::PatternRecognition => "pattern_recognition",
        }
    }

    /// Parse from string name; unknown tags coerce to `Factual`
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "factual" => KnowledgeType::Factual,
            "procedural" => KnowledgeType::Procedural,
            "contextual" => KnowledgeType::Contextual,
            "relational" => KnowledgeType::Relational,
            "experiential" => KnowledgeType::Experiential,
            "technical_discovery" => KnowledgeType::TechnicalDiscovery,
            "pattern_recognition" => KnowledgeType::PatternRecognition,
            _ => KnowledgeType::Factual,
        }
    }
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for KnowledgeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KnowledgeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(KnowledgeType::parse_name(&tag))
    }
}

// ============================================================================
// KNOWLEDGE ITEM
// ============================================================================

/// A knowledge item as delivered by a knowledge client
///
/// `id` is opaque and stable for the process lifetime. Ranking metadata
/// is optional; the scorer substitutes defaults (`importance_score` 50,
/// `access_count` 1, missing `created_at` treated as now).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub knowledge_type: KnowledgeType,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Integer 0-100
    #[serde(default)]
    pub importance_score: Option<i64>,
    #[serde(default)]
    pub access_count: Option<i64>,
}

impl KnowledgeItem {
    /// Build a minimal item; ranking metadata left unset
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        knowledge_type: KnowledgeType,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            knowledge_type,
            category: None,
            created_at: None,
            importance_score: None,
            access_count: None,
        }
    }
}

// ============================================================================
// SESSION EXCHANGES
// ============================================================================

/// Who produced a persisted exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeRole {
    User,
    Assistant,
}

impl ExchangeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeRole::User => "user",
            ExchangeRole::Assistant => "assistant",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "assistant" | "ai" => ExchangeRole::Assistant,
            _ => ExchangeRole::User,
        }
    }

    /// Transcript line prefix for the session layer
    pub fn transcript_prefix(&self) -> &'static str {
        match self {
            ExchangeRole::User => "USER",
            ExchangeRole::Assistant => "AI",
        }
    }
}

/// One turn of persisted session history (direct mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExchange {
    pub role: ExchangeRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================
