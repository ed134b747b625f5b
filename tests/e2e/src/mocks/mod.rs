//! In-Process Tool Registry
//!
//! Implements the four knowledge tools over canned data so tool-mode
//! flows can run without a network. Also records every invocation for
//! assertions.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use ember_core::{ClientError, KnowledgeItem, KnowledgeType, ToolInvoker};

/// One recorded tool invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool: String,
    pub params: Value,
}

/// Registry mock serving canned knowledge items
pub struct RegistryMock {
    items: Vec<KnowledgeItem>,
    pub invocations: Mutex<Vec<Invocation>>,
    stored: Mutex<u64>,
    pub fail: Option<ClientError>,
}

impl RegistryMock {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        Self {
            items,
            invocations: Mutex::new(Vec::new()),
            stored: Mutex::new(0),
            fail: None,
        }
    }

    pub fn failing(error: ClientError) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.fail = Some(error);
        mock
    }

    pub fn invocation_count(&self, tool: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.tool == tool)
            .count()
    }

    fn matches(item: &KnowledgeItem, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        item.title.to_lowercase().contains(&needle)
            || item.content.to_lowercase().contains(&needle)
            || item
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
    }

    fn to_array(items: Vec<&KnowledgeItem>, limit: usize) -> Value {
        let entries: Vec<Value> = items
            .into_iter()
            .take(limit)
            .map(|i| serde_json::to_value(i).unwrap())
            .collect();
        Value::Array(entries)
    }
}

#[async_trait]
impl ToolInvoker for RegistryMock {
    async fn invoke(&self, tool: &str, params: Value) -> Result<Value, ClientError> {
        self.invocations.lock().unwrap().push(Invocation {
            tool: tool.to_string(),
            params: params.clone(),
        });
        if let Some(error) = &self.fail {
            return Err(error.clone());
        }

        match tool {
            "search_knowledge" => {
                let query = params["query"].as_str().unwrap_or("").to_lowercase();
                let limit = params["limit"].as_u64().unwrap_or(10) as usize;
                let types: Option<Vec<KnowledgeType>> = params
                    .get("knowledge_types")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(KnowledgeType::parse_name)
                            .collect()
                    });
                let matched: Vec<&KnowledgeItem> = self
                    .items
                    .iter()
                    .filter(|i| {
                        query.trim().is_empty()
                            || query
                                .split_whitespace()
                                .any(|word| word != "or" && Self::matches(i, word))
                    })
                    .filter(|i| {
                        types
                            .as_ref()
                            .is_none_or(|ts| ts.contains(&i.knowledge_type))
                    })
                    .collect();
                Ok(Self::to_array(matched, limit))
            }
            "contextual_knowledge" => {
                let situation = params["situation"].as_str().unwrap_or("");
                let limit = params["max_results"].as_u64().unwrap_or(10) as usize;
                let mut matched: Vec<&KnowledgeItem> = self
                    .items
                    .iter()
                    .filter(|i| {
                        situation
                            .split_whitespace()
                            .filter(|w| w.len() > 3)
                            .any(|word| Self::matches(i, word))
                    })
                    .collect();
                if matched.is_empty() {
                    matched = self.items.iter().collect();
                }
                Ok(Self::to_array(matched, limit))
            }
            "session_context" => {
                let limit = params["max_items"].as_u64().unwrap_or(10) as usize;
                let project = params.get("project").and_then(Value::as_str);
                let matched: Vec<&KnowledgeItem> = self
                    .items
                    .iter()
                    .filter(|i| i.knowledge_type == KnowledgeType::Contextual)
                    .filter(|i| project.is_none_or(|p| Self::matches(i, p)))
                    .collect();
                Ok(Self::to_array(matched, limit))
            }
            "store_knowledge" => {
                let mut stored = self.stored.lock().unwrap();
                *stored += 1;
                Ok(json!(format!("registry-{}", *stored)))
            }
            other => Err(ClientError::Permanent(format!("unknown tool: {other}"))),
        }
    }
}

/// Fixture item with ranking metadata set
pub fn registry_item(
    id: &str,
    knowledge_type: KnowledgeType,
    category: &str,
    title: &str,
    content: &str,
    importance: i64,
) -> KnowledgeItem {
    let mut item = KnowledgeItem::new(id, title, content, knowledge_type);
    item.category = Some(category.to_string());
    item.created_at = Some(Utc::now());
    item.importance_score = Some(importance);
    item.access_count = Some(2);
    item
}

/// Default registry data covering every tool-mode path
pub fn default_registry_items() -> Vec<KnowledgeItem> {
    vec![
        registry_item(
            "r-core",
            KnowledgeType::Procedural,
            "architecture",
            "Warming procedure",
            "Essential system knowledge about warming the cache",
            75,
        ),
        registry_item(
            "r-disc",
            KnowledgeType::TechnicalDiscovery,
            "architecture",
            "Budget discovery",
            "Strategic insights about token budget architecture",
            90,
        ),
        registry_item(
            "r-exp",
            KnowledgeType::Experiential,
            "implementation",
            "Rollout experience",
            "Experience from implementation rollouts",
            58,
        ),
        registry_item(
            "r-ctx",
            KnowledgeType::Contextual,
            "ember",
            "Session context",
            "Previously discussed layered assembly work",
            52,
        ),
        registry_item(
            "r-vip",
            KnowledgeType::Factual,
            "general",
            "Escalated fact",
            "Essential system fact important enough to pin",
            95,
        ),
    ]
}
