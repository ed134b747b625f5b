//! Tool-Invocation Knowledge Client
//!
//! Forwards every knowledge operation to an external tool registry
//! through the [`ToolInvoker`] seam. The registry speaks JSON: each tool
//! takes an object parameter and answers with an array of items (or an
//! id for `store_knowledge`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::knowledge::{KnowledgeItem, KnowledgeType, SessionExchange};

use super::{ClientError, ClientMode, KnowledgeClient};

// ============================================================================
// TRANSPORT SEAM
// ============================================================================

/// Transport for named tool calls
///
/// The core only needs `invoke`; the wire protocol behind it is the
/// registry's business.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, params: Value) -> Result<Value, ClientError>;
}

/// HTTP transport: POSTs `{"tool": <name>, "params": <object>}` to one
/// endpoint and returns the JSON body
pub struct HttpToolInvoker {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpToolInvoker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolInvoker for HttpToolInvoker {
    async fn invoke(&self, tool: &str, params: Value) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "tool": tool, "params": params }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ClientError::Transient(format!("tool endpoint unreachable: {e}"))
                } else {
                    ClientError::Permanent(format!("tool request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ClientError::Transient(format!(
                "tool endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ClientError::Permanent(format!(
                "tool endpoint returned {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Permanent(format!("malformed tool response: {e}")))
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Knowledge client backed by a tool registry
pub struct ToolClient {
    invoker: Arc<dyn ToolInvoker>,
    calls: AtomicU64,
}

impl ToolClient {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            calls: AtomicU64::new(0),
        }
    }

    async fn call(&self, tool: &str, params: Value) -> Result<Value, ClientError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!(tool, "invoking knowledge tool");
        self.invoker.invoke(tool, params).await
    }

    /// Parse a tool result expected to be an array of knowledge items.
    /// Items that fail to parse are dropped rather than failing the call.
    fn parse_items(value: Value) -> Result<Vec<KnowledgeItem>, ClientError> {
        match value {
            Value::Array(entries) => Ok(entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect()),
            other => Err(ClientError::Permanent(format!(
                "expected item array from tool, got {}",
                kind_of(&other)
            ))),
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl KnowledgeClient for ToolClient {
    async fn search_knowledge(
        &self,
        query: &str,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        let mut params = json!({ "query": query, "limit": limit });
        if let Some(types) = types {
            params["knowledge_types"] =
                Value::Array(types.iter().map(|t| Value::String(t.as_str().into())).collect());
        }
        let result = self.call("search_knowledge", params).await?;
        Self::parse_items(result)
    }

    async fn get_contextual_knowledge(
        &self,
        situation: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        let result = self
            .call(
                "contextual_knowledge",
                json!({ "situation": situation, "max_results": max_results }),
            )
            .await?;
        Self::parse_items(result)
    }

    async fn get_session_context(
        &self,
        max_items: usize,
        project: Option<&str>,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        let mut params = json!({ "max_items": max_items });
        if let Some(project) = project {
            params["project"] = Value::String(project.into());
        }
        let result = self.call("session_context", params).await?;
        Self::parse_items(result)
    }

    async fn store_knowledge(
        &self,
        knowledge_type: KnowledgeType,
        title: &str,
        content: &str,
        category: Option<&str>,
        importance: Option<i64>,
    ) -> Result<String, ClientError> {
        let mut params = json!({
            "knowledge_type": knowledge_type.as_str(),
            "title": title,
            "content": content,
        });
        if let Some(category) = category {
            params["category"] = Value::String(category.into());
        }
        if let Some(importance) = importance {
            params["importance_score"] = Value::from(importance);
        }
        let result = self.call("store_knowledge", params).await?;
        match result {
            Value::String(id) => Ok(id),
            Value::Object(ref obj) => obj
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ClientError::Permanent("store_knowledge result carried no id".into())
                }),
            other => Err(ClientError::Permanent(format!(
                "expected id from store_knowledge, got {}",
                kind_of(&other)
            ))),
        }
    }

    async fn load_session_history(
        &self,
        _session_id: &str,
        _max_exchanges: usize,
    ) -> Result<Vec<SessionExchange>, ClientError> {
        // The registry exposes no transcript tool; tool-mode assembly
        // reads session context items instead.
        Ok(Vec::new())
    }

    fn mode(&self) -> ClientMode {
        ClientMode::Tool
    }

    fn tool_calls(&self) -> Option<u64> {
        Some(self.calls.load(Ordering::Relaxed))
    }
}

// ============================================================================
// TESTS
// ============================================================================
