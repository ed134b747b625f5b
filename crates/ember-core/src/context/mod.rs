//! Context Manager
//!
//! Assembles the layered context window for a query. Seven layers are
//! loaded (system, project, session, domain, experience, strategic,
//! dynamic), each guarded so a failing fetch degrades to a short
//! diagnostic string, then compiled in canonical order under the token
//! budget. The `response` layer stays reserved for the consumer.

mod domains;
mod tokens;

pub use domains::analyze_query_domains;
pub use tokens::estimate_tokens;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::client::{ClientError, ClientMode, KnowledgeClient, SearchScope};
use crate::knowledge::{ContextLayer, KnowledgeItem, KnowledgeType};

/// Below this remaining budget the dynamic layer gives up
const DYNAMIC_MIN_TOKENS: usize = 1_000;

/// Emitted verbatim when the dynamic layer has no room left
pub const DYNAMIC_EXHAUSTED: &str = "Limited space for dynamic content";

const SESSION_EXCHANGE_LIMIT: usize = 10;
const SESSION_CONTEXT_ITEMS: usize = 5;
const DOMAIN_ITEM_LIMIT: usize = 10;
const EXPERIENCE_ITEM_LIMIT: usize = 5;
const STRATEGIC_ITEM_LIMIT: usize = 5;
const DYNAMIC_ITEM_LIMIT: usize = 3;

/// Tool-mode strategic layer only keeps items above this importance
const MIN_STRATEGIC_IMPORTANCE: i64 = 60;

// ============================================================================
// CONTEXT MANAGER
// ============================================================================

/// Loads and compiles the per-query context window
pub struct ContextManager {
    client: Arc<dyn KnowledgeClient>,
    max_context_tokens: usize,
    project: String,
}

impl ContextManager {
    pub fn new(
        client: Arc<dyn KnowledgeClient>,
        max_context_tokens: usize,
        project: impl Into<String>,
    ) -> Self {
        Self {
            client,
            max_context_tokens,
            project: project.into(),
        }
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    /// Load every layer for `query` and compile the context window
    pub async fn load_context_for_query(&self, query: &str, session_id: &str) -> String {
        let mut bodies: HashMap<ContextLayer, String> = HashMap::new();

        bodies.insert(ContextLayer::System, self.load_system_context());

        // The five client-backed leading layers are independent; fetch
        // them together, then guard and budget each body.
        let (project, session, domain, experience, strategic) = tokio::join!(
            self.load_project_context(),
            self.load_session_context(session_id),
            self.load_domain_context(query),
            self.load_experience_context(query),
            self.load_strategic_context(query),
        );
        bodies.insert(ContextLayer::Project, guard(ContextLayer::Project, project));
        bodies.insert(ContextLayer::Session, guard(ContextLayer::Session, session));
        bodies.insert(ContextLayer::Domain, guard(ContextLayer::Domain, domain));
        bodies.insert(
            ContextLayer::Experience,
            guard(ContextLayer::Experience, experience),
        );
        bodies.insert(
            ContextLayer::Strategic,
            guard(ContextLayer::Strategic, strategic),
        );

        for (layer, body) in bodies.iter_mut() {
            enforce_budget(*layer, body);
        }

        // Whatever budget is left goes to the dynamic layer.
        let used: usize = bodies.values().map(|body| estimate_tokens(body)).sum();
        let remaining = self.max_context_tokens.saturating_sub(used);
        let mut dynamic = guard(
            ContextLayer::Dynamic,
            self.load_dynamic_context(query, remaining).await,
        );
        enforce_budget(ContextLayer::Dynamic, &mut dynamic);
        bodies.insert(ContextLayer::Dynamic, dynamic);

        compile_context(&bodies)
    }

    // ------------------------------------------------------------------
    // Layer loaders
    // ------------------------------------------------------------------

    /// Fixed preamble describing the assistant's role
    fn load_system_context(&self) -> String {
        "CAG-enabled assistant backed by a warm knowledge cache.\n\
         Ranked knowledge is preloaded once per session for instant access.\n\
         Context is assembled in layers under a fixed token budget."
            .to_string()
    }

    async fn load_project_context(&self) -> Result<String, ClientError> {
        let mut lines = vec![
            format!("Project: {}", self.project),
            "Status: warm cache active".to_string(),
        ];
        match self.client.mode() {
            ClientMode::Direct => {
                lines.push("Access: direct knowledge store".to_string());
            }
            ClientMode::Tool => {
                lines.push("Access: tool-integrated knowledge registry".to_string());
                let items = self
                    .client
                    .get_session_context(SESSION_CONTEXT_ITEMS, Some(&self.project))
                    .await?;
                for item in items {
                    lines.push(format!("- {}: {}", item.title, excerpt(&item.content, 100)));
                }
            }
        }
        Ok(lines.join("\n"))
    }

    async fn load_session_context(&self, session_id: &str) -> Result<String, ClientError> {
        match self.client.mode() {
            ClientMode::Direct => {
                let exchanges = self
                    .client
                    .load_session_history(session_id, SESSION_EXCHANGE_LIMIT)
                    .await?;
                if exchanges.is_empty() {
                    return Ok("No session history found".to_string());
                }
                Ok(exchanges
                    .iter()
                    .map(|ex| format!("{}: {}", ex.role.transcript_prefix(), ex.content))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ClientMode::Tool => {
                let items = self
                    .client
                    .get_session_context(SESSION_EXCHANGE_LIMIT, None)
                    .await?;
                let recent: Vec<String> = items
                    .iter()
                    .filter(|i| i.knowledge_type == KnowledgeType::Contextual)
                    .take(SESSION_CONTEXT_ITEMS)
                    .map(|i| format!("Previous: {}", excerpt(&i.content, 100)))
                    .collect();
                if recent.is_empty() {
                    return Ok("New session - no previous history".to_string());
                }
                Ok(recent.join("\n"))
            }
        }
    }

    async fn load_domain_context(&self, query: &str) -> Result<String, ClientError> {
        let domains = analyze_query_domains(query, self.client.mode());
        let items = match self.client.mode() {
            ClientMode::Direct => {
                // One category search per domain tag, merged and
                // deduplicated. Title and content matches do not make an
                // item domain knowledge.
                let mut merged: Vec<KnowledgeItem> = Vec::new();
                for domain in &domains {
                    let batch = self
                        .client
                        .search_knowledge_scoped(
                            domain,
                            SearchScope::Category,
                            None,
                            DOMAIN_ITEM_LIMIT,
                        )
                        .await?;
                    for item in batch {
                        if !merged.iter().any(|m| m.id == item.id) {
                            merged.push(item);
                        }
                    }
                }
                merged.truncate(DOMAIN_ITEM_LIMIT);
                merged
            }
            ClientMode::Tool => {
                self.client
                    .search_knowledge(
                        &domains.join(" OR "),
                        Some(&[KnowledgeType::Procedural, KnowledgeType::TechnicalDiscovery]),
                        DOMAIN_ITEM_LIMIT,
                    )
                    .await?
            }
        };

        if items.is_empty() {
            return Ok("No domain knowledge found".to_string());
        }
        Ok(items
            .iter()
            .map(|i| {
                format!(
                    "[{}] {}: {}",
                    i.knowledge_type,
                    i.title,
                    excerpt(&i.content, 200)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn load_experience_context(&self, query: &str) -> Result<String, ClientError> {
        let items = match self.client.mode() {
            ClientMode::Direct => {
                self.client
                    .search_knowledge(
                        query,
                        Some(&[KnowledgeType::Experiential]),
                        EXPERIENCE_ITEM_LIMIT,
                    )
                    .await?
            }
            ClientMode::Tool => {
                let situation = format!("Experience related to: {query}");
                let mut items = self
                    .client
                    .get_contextual_knowledge(&situation, EXPERIENCE_ITEM_LIMIT)
                    .await?;
                items.retain(|i| i.knowledge_type == KnowledgeType::Experiential);
                items
            }
        };

        if items.is_empty() {
            return Ok("No experience memory available".to_string());
        }
        Ok(items
            .iter()
            .map(|i| {
                format!(
                    "[{}] {}: {}",
                    i.category.as_deref().unwrap_or("uncategorized"),
                    i.title,
                    excerpt(&i.content, 150)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn load_strategic_context(&self, query: &str) -> Result<String, ClientError> {
        let types = [KnowledgeType::Procedural, KnowledgeType::TechnicalDiscovery];
        let mut items = match self.client.mode() {
            ClientMode::Direct => {
                self.client
                    .search_knowledge("", Some(&types), STRATEGIC_ITEM_LIMIT)
                    .await?
            }
            ClientMode::Tool => {
                self.client
                    .search_knowledge(
                        &format!("strategic insights {query}"),
                        Some(&types),
                        STRATEGIC_ITEM_LIMIT,
                    )
                    .await?
            }
        };
        if self.client.mode() == ClientMode::Tool {
            items.retain(|i| i.importance_score.unwrap_or(0) > MIN_STRATEGIC_IMPORTANCE);
        }

        if items.is_empty() {
            return Ok("No strategic insights available".to_string());
        }
        Ok(items
            .iter()
            .map(|i| {
                format!(
                    "[{}] {}: {}",
                    i.knowledge_type,
                    i.title,
                    excerpt(&i.content, 150)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn load_dynamic_context(
        &self,
        query: &str,
        remaining_tokens: usize,
    ) -> Result<String, ClientError> {
        if remaining_tokens < DYNAMIC_MIN_TOKENS {
            return Ok(DYNAMIC_EXHAUSTED.to_string());
        }

        let items = match self.client.mode() {
            ClientMode::Direct => self.client.search_knowledge("", None, DYNAMIC_ITEM_LIMIT).await?,
            ClientMode::Tool => {
                self.client
                    .search_knowledge(query, None, DYNAMIC_ITEM_LIMIT)
                    .await?
            }
        };

        Ok(items
            .iter()
            .map(|i| {
                format!(
                    "[{}] {}: {}",
                    i.knowledge_type,
                    i.title,
                    excerpt(&i.content, 100)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// First `max_chars` characters plus a continuation marker
fn excerpt(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Substitute a diagnostic body when a layer fetch failed
fn guard(layer: ContextLayer, outcome: Result<String, ClientError>) -> String {
    match outcome {
        Ok(body) => body,
        Err(e) => {
            warn!(layer = %layer, error = %e, "layer fetch failed, emitting diagnostic");
            let reason = match &e {
                ClientError::Transient(r) | ClientError::Permanent(r) => r.clone(),
            };
            let name = layer.as_str();
            let mut label = String::with_capacity(name.len());
            label.push_str(&name[..1].to_uppercase());
            label.push_str(&name[1..]);
            format!("{label} unavailable: {reason}")
        }
    }
}

/// Truncate a body that blew past twice its layer allocation
fn enforce_budget(layer: ContextLayer, body: &mut String) {
    let allocation = layer.token_allocation();
    let cost = estimate_tokens(body);
    if cost <= 2 * allocation {
        return;
    }
    warn!(
        layer = %layer,
        tokens = cost,
        allocation,
        "layer body exceeded twice its allocation, truncating"
    );
    let max_words = (allocation as f64 / 1.3).floor() as usize;
    *body = body
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");
}

/// Compile non-empty layer bodies in canonical order
fn compile_context(bodies: &HashMap<ContextLayer, String>) -> String {
    let mut compiled: Vec<String> = Vec::new();
    for layer in ContextLayer::ALL {
        if let Some(body) = bodies.get(&layer) {
            if !body.is_empty() {
                compiled.push(layer.header());
                compiled.push(body.clone());
                compiled.push(String::new());
            }
        }
    }
    compiled.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================
