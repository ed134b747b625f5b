//! Context Layers
//!
//! The eight named partitions used both as warm-cache partitions and as
//! sections of the compiled context window. Enum order is compilation
//! order.

use serde::{Deserialize, Serialize};

/// Ordered closed set of context layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLayer {
    System,
    Project,
    Session,
    Domain,
    Experience,
    Strategic,
    Dynamic,
    Response,
}

impl ContextLayer {
    /// All layers in canonical compilation order
    pub const ALL: [ContextLayer; 8] = [
        ContextLayer::System,
        ContextLayer::Project,
        ContextLayer::Session,
        ContextLayer::Domain,
        ContextLayer::Experience,
        ContextLayer::Strategic,
        ContextLayer::Dynamic,
        ContextLayer::Response,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLayer::System => "system",
            ContextLayer::Project => "project",
            ContextLayer::Session => "session",
            ContextLayer::Domain => "domain",
            ContextLayer::Experience => "experience",
            ContextLayer::Strategic => "strategic",
            ContextLayer::Dynamic => "dynamic",
            ContextLayer::Response => "response",
        }
    }

    /// Parse from layer name; `None` for unrecognized names
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system" => Some(ContextLayer::System),
            "project" => Some(ContextLayer::Project),
            "session" => Some(ContextLayer::Session),
            "domain" => Some(ContextLayer::Domain),
            "experience" => Some(ContextLayer::Experience),
            "strategic" => Some(ContextLayer::Strategic),
            "dynamic" => Some(ContextLayer::Dynamic),
            "response" => Some(ContextLayer::Response),
            _ => None,
        }
    }

    /// Fixed per-layer token allocation; the table sums below the
    /// default 128k window
    pub fn token_allocation(&self) -> usize {
        match self {
            ContextLayer::System => 2_000,
            ContextLayer::Project => 8_000,
            ContextLayer::Session => 16_000,
            ContextLayer::Domain => 32_000,
            ContextLayer::Experience => 24_000,
            ContextLayer::Strategic => 16_000,
            ContextLayer::Dynamic => 24_000,
            ContextLayer::Response => 6_000,
        }
    }

    /// Section header emitted into the compiled context
    pub fn header(&self) -> String {
        format!("=== {} CONTEXT ===", self.as_str().to_uppercase())
    }
}

impl std::fmt::Display for ContextLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
