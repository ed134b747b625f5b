//! Knowledge Client
//!
//! The uniform capability the core consumes: search by query, contextual
//! lookup, session-scoped fetch, knowledge store, and session-history
//! reconstruction. Two variants implement it behind one contract:
//!
//! - [`DirectStoreClient`] issues queries against a local knowledge store
//! - [`ToolClient`] forwards to an external tool registry
//!
//! The assembly logic never branches on the concrete type; the few
//! mode-dependent behaviors key off [`ClientMode`].

mod direct;
mod tool;

pub use direct::DirectStoreClient;
pub use tool::{HttpToolInvoker, ToolClient, ToolInvoker};

use async_trait::async_trait;

use crate::knowledge::{KnowledgeItem, KnowledgeType, SessionExchange};

// ============================================================================
// ERRORS
// ============================================================================

/// Knowledge client failure
///
/// Transient failures degrade to empty results in non-critical paths;
/// permanent failures indicate a broken client (auth, schema, protocol).
/// The core never retries either - retry policy belongs to the client.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Timeout, connection reset, or an empty-but-recoverable response
    #[error("transient client failure: {0}")]
    Transient(String),
    /// Authentication, schema mismatch, or protocol error
    #[error("permanent client failure: {0}")]
    Permanent(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Which knowledge-access variant is behind the client contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Queries issued against the knowledge store
    Direct,
    /// Calls forwarded to an external tool registry
    Tool,
}

/// Which item fields a substring search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Title, content, or category
    FullText,
    /// Category only
    Category,
    /// Content or category; never the title
    ContentOrCategory,
}

// ============================================================================
// CAPABILITY CONTRACT
// ============================================================================

/// The knowledge-access capability
///
/// Every operation either returns a (possibly empty) list/id or fails
/// with a [`ClientError`]. Implementations must produce items carrying at
/// least `id`, `title`, `content`, and `knowledge_type`.
#[async_trait]
pub trait KnowledgeClient: Send + Sync {
    /// Search by free-text query with optional type filter
    ///
    /// An empty query applies no text predicate, so the result is the
    /// `limit` most recent items passing the type filter.
    async fn search_knowledge(
        &self,
        query: &str,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError>;

    /// Search restricted to the given item fields
    ///
    /// The store contract scopes some lookups to category and content
    /// matches. The tool registry exposes no field scoping, so the tool
    /// variant forwards to [`search_knowledge`] unchanged; its searches
    /// are already narrowed by query and type filters.
    ///
    /// [`search_knowledge`]: KnowledgeClient::search_knowledge
    async fn search_knowledge_scoped(
        &self,
        query: &str,
        _scope: SearchScope,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.search_knowledge(query, types, limit).await
    }

    /// Contextual lookup by situation string
    async fn get_contextual_knowledge(
        &self,
        situation: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError>;

    /// Session-scoped knowledge fetch, optionally narrowed to a project
    async fn get_session_context(
        &self,
        max_items: usize,
        project: Option<&str>,
    ) -> Result<Vec<KnowledgeItem>, ClientError>;

    /// Persist one knowledge item; returns its id
    async fn store_knowledge(
        &self,
        knowledge_type: KnowledgeType,
        title: &str,
        content: &str,
        category: Option<&str>,
        importance: Option<i64>,
    ) -> Result<String, ClientError>;

    /// Reconstruct persisted session history, oldest first
    ///
    /// The tool variant answers with an empty list; tool-mode assembly
    /// draws session context from [`get_session_context`] instead.
    ///
    /// [`get_session_context`]: KnowledgeClient::get_session_context
    async fn load_session_history(
        &self,
        session_id: &str,
        max_exchanges: usize,
    ) -> Result<Vec<SessionExchange>, ClientError>;

    /// Which variant this client is
    fn mode(&self) -> ClientMode;

    /// Number of tool invocations issued so far (tool variant only)
    fn tool_calls(&self) -> Option<u64> {
        None
    }
}
