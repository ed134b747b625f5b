//! In-memory knowledge client for unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::client::{ClientError, ClientMode, KnowledgeClient, SearchScope};
use crate::knowledge::{KnowledgeItem, KnowledgeType, SessionExchange};

/// One captured `store_knowledge` call
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub knowledge_type: KnowledgeType,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub importance: Option<i64>,
}

/// Canned-data client; fails every operation when `fail` is set
pub struct MockClient {
    pub items: Vec<KnowledgeItem>,
    pub history: HashMap<String, Vec<SessionExchange>>,
    pub mode: ClientMode,
    pub fail: Option<ClientError>,
    pub stored: Mutex<Vec<StoredRecord>>,
    calls: AtomicU64,
}

impl MockClient {
    pub fn new(mode: ClientMode, items: Vec<KnowledgeItem>) -> Self {
        Self {
            items,
            history: HashMap::new(),
            mode,
            fail: None,
            stored: Mutex::new(Vec::new()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn failing(mode: ClientMode, error: ClientError) -> Self {
        let mut client = Self::new(mode, Vec::new());
        client.fail = Some(error);
        client
    }

    fn guard(&self) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.fail {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn sorted_desc(mut items: Vec<KnowledgeItem>) -> Vec<KnowledgeItem> {
        let far_future: DateTime<Utc> = Utc::now() + chrono::Duration::days(3650);
        items.sort_by_key(|i| std::cmp::Reverse(i.created_at.unwrap_or(far_future)));
        items
    }

    fn text_matches(item: &KnowledgeItem, needle: &str) -> bool {
        Self::scope_matches(item, needle, SearchScope::FullText)
    }

    fn scope_matches(item: &KnowledgeItem, needle: &str, scope: SearchScope) -> bool {
        let needle = needle.to_lowercase();
        let title = item.title.to_lowercase().contains(&needle);
        let content = item.content.to_lowercase().contains(&needle);
        let category = item
            .category
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(&needle));
        match scope {
            SearchScope::FullText => title || content || category,
            SearchScope::Category => category,
            SearchScope::ContentOrCategory => content || category,
        }
    }
}

/// Knowledge item with ranking metadata, for fixtures
pub fn item(
    id: &str,
    knowledge_type: KnowledgeType,
    category: &str,
    title: &str,
    content: &str,
    importance: i64,
) -> KnowledgeItem {
    let mut it = KnowledgeItem::new(id, title, content, knowledge_type);
    it.category = Some(category.to_string());
    it.created_at = Some(Utc::now());
    it.importance_score = Some(importance);
    it.access_count = Some(3);
    it
}

#[async_trait]
impl KnowledgeClient for MockClient {
    async fn search_knowledge(
        &self,
        query: &str,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.search_knowledge_scoped(query, SearchScope::FullText, types, limit)
            .await
    }

    async fn search_knowledge_scoped(
        &self,
        query: &str,
        scope: SearchScope,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.guard()?;
        let words: Vec<&str> = query
            .split_whitespace()
            .filter(|w| !w.eq_ignore_ascii_case("or"))
            .collect();
        let mut matched: Vec<KnowledgeItem> = self
            .items
            .iter()
            .filter(|i| {
                words.is_empty() || words.iter().any(|w| Self::scope_matches(i, w, scope))
            })
            .filter(|i| types.is_none_or(|ts| ts.contains(&i.knowledge_type)))
            .cloned()
            .collect();
        matched = Self::sorted_desc(matched);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn get_contextual_knowledge(
        &self,
        situation: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.guard()?;
        let words: Vec<&str> = situation
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .collect();
        let mut matched: Vec<KnowledgeItem> = self
            .items
            .iter()
            .filter(|i| words.iter().any(|w| Self::text_matches(i, w)))
            .cloned()
            .collect();
        if matched.is_empty() {
            matched = self.items.clone();
        }
        matched = Self::sorted_desc(matched);
        matched.truncate(max_results);
        Ok(matched)
    }

    async fn get_session_context(
        &self,
        max_items: usize,
        project: Option<&str>,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.guard()?;
        let mut matched: Vec<KnowledgeItem> = self
            .items
            .iter()
            .filter(|i| i.knowledge_type == KnowledgeType::Contextual)
            .filter(|i| project.is_none_or(|p| Self::text_matches(i, p)))
            .cloned()
            .collect();
        matched = Self::sorted_desc(matched);
        matched.truncate(max_items);
        Ok(matched)
    }

    async fn store_knowledge(
        &self,
        knowledge_type: KnowledgeType,
        title: &str,
        content: &str,
        category: Option<&str>,
        importance: Option<i64>,
    ) -> Result<String, ClientError> {
        self.guard()?;
        let mut stored = self.stored.lock().unwrap();
        stored.push(StoredRecord {
            knowledge_type,
            title: title.to_string(),
            content: content.to_string(),
            category: category.map(str::to_string),
            importance,
        });
        Ok(format!("stored-{}", stored.len()))
    }

    async fn load_session_history(
        &self,
        session_id: &str,
        max_exchanges: usize,
    ) -> Result<Vec<SessionExchange>, ClientError> {
        self.guard()?;
        let mut history = self.history.get(session_id).cloned().unwrap_or_default();
        if history.len() > max_exchanges {
            history = history.split_off(history.len() - max_exchanges);
        }
        Ok(history)
    }

    fn mode(&self) -> ClientMode {
        self.mode
    }

    fn tool_calls(&self) -> Option<u64> {
        match self.mode {
            ClientMode::Tool => Some(self.calls.load(Ordering::Relaxed)),
            ClientMode::Direct => None,
        }
    }
}
