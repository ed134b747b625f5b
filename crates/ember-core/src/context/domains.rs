//! Query Domain Analysis
//!
//! Maps a free-text query to the knowledge domains it touches via a
//! fixed keyword table. All matching domains are collected; queries
//! matching nothing fall back to `general`.

use crate::client::ClientMode;

const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("database", &["database", "postgresql", "sql", "pgvector"]),
    ("architecture", &["architecture", "design", "system", "framework"]),
    ("implementation", &["implement", "code", "develop", "build"]),
    ("configuration", &["config", "setup", "install", "deploy"]),
    ("testing", &["test", "validate", "verify", "debug"]),
    ("knowledge", &["knowledge", "learning", "pattern", "insight"]),
];

/// Only meaningful when knowledge flows through a tool registry
const TOOL_DOMAIN: (&str, &[&str]) = ("mcp", &["mcp", "integration", "tools", "framework"]);

/// Collect the domains a query touches
pub fn analyze_query_domains(query: &str, mode: ClientMode) -> Vec<String> {
    let query = query.to_lowercase();
    let mut domains: Vec<String> = DOMAIN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| query.contains(kw)))
        .map(|(domain, _)| domain.to_string())
        .collect();

    if mode == ClientMode::Tool {
        let (domain, keywords) = TOOL_DOMAIN;
        if keywords.iter().any(|kw| query.contains(kw)) {
            domains.push(domain.to_string());
        }
    }

    if domains.is_empty() {
        domains.push("general".to_string());
    }
    domains
}
