//! # Ember Core
//!
//! Cache-augmented generation (CAG) core: a context-assembly and
//! cache-warming engine that fronts a knowledge store. Instead of
//! hitting the store on every query, Ember pre-loads ranked knowledge
//! into an in-memory working set and synthesizes a token-budgeted,
//! layered context window per query.
//!
//! - **Priority-based cache warming**: a weighted composite score over
//!   heterogeneous knowledge items drives phased, partially concurrent
//!   preloading, idempotent per session
//! - **Layered context assembly**: eight semantically distinct layers
//!   compiled in a fixed order under per-layer token allocations, with
//!   dynamic overflow absorption
//! - **Knowledge-access abstraction**: one capability trait with a
//!   direct-store implementation and a tool-invocation implementation,
//!   selected at construction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_core::{EmberConfig, EmberEngine};
//!
//! # async fn run() -> ember_core::Result<()> {
//! let config = EmberConfig::direct("/var/lib/ember/knowledge.db");
//! let engine = EmberEngine::from_config(&config)?;
//!
//! let envelope = engine.process_query("How do I warm the cache?", "session-1", None).await?;
//! println!("{} tokens of context", envelope.context_size_tokens);
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod metrics;
pub mod scoring;

#[cfg(test)]
pub(crate) mod testutil;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Knowledge model
pub use knowledge::{ContextLayer, ExchangeRole, KnowledgeItem, KnowledgeType, SessionExchange};

// Client capability
pub use client::{
    ClientError, ClientMode, DirectStoreClient, HttpToolInvoker, KnowledgeClient, SearchScope,
    ToolClient, ToolInvoker,
};

// Scoring
pub use scoring::{LayerClassifier, PriorityScorer, ScoringMode, strategic_value, type_weight};

// Warm cache and warming
pub use cache::{
    CacheEntry, CacheStats, CacheWarmer, SessionWarmingRecord, UserContext, WarmCache,
    WarmingStats,
};

// Context assembly
pub use context::{DYNAMIC_EXHAUSTED, analyze_query_domains, estimate_tokens};
pub use context::ContextManager;

// Engine
pub use engine::{
    CacheSample, CacheSummary, DomainWarmingResult, EmberEngine, QueryEnvelope, QueryPerformance,
};

// Configuration and errors
pub use config::{EmberConfig, StoreBackend};
pub use error::{EmberError, Result};
pub use metrics::PerformanceMetrics;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        CacheEntry, CacheSummary, ClientError, ClientMode, ContextLayer, ContextManager,
        DirectStoreClient, EmberConfig, EmberEngine, EmberError, KnowledgeClient, KnowledgeItem,
        KnowledgeType, PerformanceMetrics, QueryEnvelope, Result, SearchScope, ToolClient,
        ToolInvoker, UserContext, WarmCache, WarmingStats,
    };
}
