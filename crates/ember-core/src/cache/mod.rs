//! Warm Cache
//!
//! Process-local, non-durable working set of prioritized knowledge.
//! Keys are `"<layer>:<id>"`, insertion is gated by the priority
//! threshold, and the cache grows monotonically: the item cap refuses
//! new keys, it never evicts existing entries.

mod warmer;

pub use warmer::{CacheWarmer, SessionWarmingRecord, UserContext, WarmingStats};

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};
use crate::knowledge::{ContextLayer, KnowledgeType};

// ============================================================================
// ENTRIES
// ============================================================================

/// Value stored in the warm cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content: String,
    pub title: String,
    pub knowledge_type: KnowledgeType,
    /// Priority in [0,1] that admitted this entry
    pub priority: f64,
    pub loaded_at: DateTime<Utc>,
    /// Provenance: which warming phase produced the entry
    pub source_tag: String,
    pub access_count: u64,
}

/// Aggregate statistics over the cache contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_items: usize,
    /// Distinct layers currently holding at least one entry
    pub cache_layers: usize,
    pub average_priority: f64,
    /// Sum of serialized entry lengths, a cheap memory proxy
    pub memory_usage_estimate: usize,
}

// ============================================================================
// WARM CACHE
// ============================================================================

/// In-memory `"<layer>:<id>"` map of cache entries
///
/// Readers share the lock; writers serialize through it. All methods
/// take `&self`, so the cache is shared behind `Arc`.
pub struct WarmCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    priority_threshold: f64,
    max_items: usize,
}

impl WarmCache {
    pub fn new(priority_threshold: f64, max_items: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            priority_threshold,
            max_items,
        }
    }

    pub fn priority_threshold(&self) -> f64 {
        self.priority_threshold
    }

    /// Cache key for an item in a layer
    pub fn key_for(layer: ContextLayer, id: &str) -> String {
        format!("{layer}:{id}")
    }

    /// Insert an entry if it clears the priority gate and the cap
    ///
    /// Returns whether the entry was stored. Overwriting an existing key
    /// is always allowed (last write wins); genuinely new keys are
    /// refused once the cap is reached.
    pub fn insert(&self, layer: ContextLayer, id: &str, entry: CacheEntry) -> Result<bool> {
        if entry.priority < self.priority_threshold {
            return Ok(false);
        }
        let key = Self::key_for(layer, id);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?;
        if !entries.contains_key(&key) && entries.len() >= self.max_items {
            tracing::debug!(%key, "warm cache full, refusing insert");
            return Ok(false);
        }
        entries.insert(key, entry);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?
            .clear();
        Ok(())
    }

    /// Entries whose key starts with `"<layer>:"`, best priority first
    pub fn entries_for_layer(&self, layer: ContextLayer) -> Result<Vec<(String, CacheEntry)>> {
        let prefix = format!("{layer}:");
        let entries = self
            .entries
            .read()
            .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?;
        let mut matched: Vec<(String, CacheEntry)> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        sort_by_priority(&mut matched);
        Ok(matched)
    }

    /// Top entries by priority, optionally restricted to one layer
    pub fn top_entries(
        &self,
        layer: Option<ContextLayer>,
        limit: usize,
    ) -> Result<Vec<(String, CacheEntry)>> {
        let mut matched = match layer {
            Some(layer) => self.entries_for_layer(layer)?,
            None => {
                let entries = self
                    .entries
                    .read()
                    .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?;
                let mut all: Vec<(String, CacheEntry)> = entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect();
                sort_by_priority(&mut all);
                all
            }
        };
        matched.truncate(limit);
        Ok(matched)
    }

    /// Fetch one entry and bump its access counter
    pub fn touch(&self, layer: ContextLayer, id: &str) -> Result<Option<CacheEntry>> {
        let key = Self::key_for(layer, id);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?;
        Ok(entries.get_mut(&key).map(|entry| {
            entry.access_count += 1;
            entry.clone()
        }))
    }

    /// Current aggregate statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EmberError::State("warm cache lock poisoned".into()))?;
        let total = entries.len();
        let layers: HashSet<&str> = entries
            .keys()
            .filter_map(|key| key.split(':').next())
            .collect();
        let priority_sum: f64 = entries.values().map(|e| e.priority).sum();
        let memory: usize = entries
            .values()
            .map(|e| serde_json::to_string(e).map(|s| s.len()).unwrap_or(0))
            .sum();
        Ok(CacheStats {
            total_items: total,
            cache_layers: layers.len(),
            average_priority: if total == 0 { 0.0 } else { priority_sum / total as f64 },
            memory_usage_estimate: memory,
        })
    }
}

fn sort_by_priority(entries: &mut [(String, CacheEntry)]) {
    entries.sort_by(|a, b| {
        b.1.priority
            .partial_cmp(&a.1.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ============================================================================
// TESTS
// ============================================================================
