//! Engine Performance Metrics
//!
//! Process-wide aggregates updated once per query. The five-field
//! update happens inside one lock acquisition so concurrent queries
//! cannot interleave partial updates.

use serde::{Deserialize, Serialize};

/// Rolling engine-level counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Rolling mean of total processing time, in seconds
    pub average_response_time: f64,
    /// Knowledge tool invocations issued so far (tool mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<u64>,
}

impl PerformanceMetrics {
    /// Fold one query outcome into the aggregates
    pub fn record_query(&mut self, cache_hit: bool, processing_time: f64) {
        self.total_queries += 1;
        if cache_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        let n = self.total_queries as f64;
        self.average_response_time =
            (self.average_response_time * (n - 1.0) + processing_time) / n;
    }

    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_queries as f64 * 100.0
        }
    }
}
