//! Bounded parse cache, keyed by normalised text and conversation.
//!
//! Insertion-ordered: when full, the oldest entry is evicted. Lookups do
//! not refresh recency, so a repeated query keeps its original slot.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::trace;

use crate::parser::ParsedQuery;

pub struct QueryCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, ParsedQuery>,
    order: VecDeque<String>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn key(text: &str, conversation_id: Option<&str>) -> String {
        format!(
            "{}::{}",
            text.trim().to_lowercase(),
            conversation_id.unwrap_or("")
        )
    }

    pub fn get(&self, text: &str, conversation_id: Option<&str>) -> Option<ParsedQuery> {
        if self.capacity == 0 {
            return None;
        }
        let key = Self::key(text, conversation_id);
        let inner = self.inner.lock().ok()?;
        let hit = inner.entries.get(&key).cloned();
        if hit.is_some() {
            trace!(key = %key, "parse cache hit");
        }
        hit
    }

    pub fn put(&self, text: &str, conversation_id: Option<&str>, parsed: ParsedQuery) {
        if self.capacity == 0 {
            return;
        }
        let key = Self::key(text, conversation_id);
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.insert(key.clone(), parsed).is_none() {
            inner.order.push_back(key);
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.order.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entities;
    use chrono::Utc;

    fn parsed(intent: &str) -> ParsedQuery {
        ParsedQuery {
            intent: intent.to_string(),
            confidence: 0.9,
            entities: Entities::new(),
            raw_text: String::new(),
            timestamp: Utc::now(),
            conversation_id: None,
            alternative_intent: None,
            alternative_confidence: None,
        }
    }

    #[test]
    fn key_normalises_case_and_whitespace() {
        let cache = QueryCache::new(4);
        cache.put("  Show Stand A1 ", None, parsed("stand.details"));
        let hit = cache.get("show stand a1", None).unwrap();
        assert_eq!(hit.intent, "stand.details");
    }

    #[test]
    fn conversations_do_not_share_entries() {
        let cache = QueryCache::new(4);
        cache.put("next", Some("conv-1"), parsed("stand.details"));
        assert!(cache.get("next", Some("conv-2")).is_none());
        assert!(cache.get("next", Some("conv-1")).is_some());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let cache = QueryCache::new(2);
        cache.put("first", None, parsed("a"));
        cache.put("second", None, parsed("b"));
        cache.put("third", None, parsed("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("first", None).is_none());
        assert!(cache.get("second", None).is_some());
        assert!(cache.get("third", None).is_some());
    }

    #[test]
    fn overwrite_does_not_grow_order() {
        let cache = QueryCache::new(2);
        cache.put("same", None, parsed("a"));
        cache.put("same", None, parsed("b"));
        cache.put("other", None, parsed("c"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("same", None).unwrap().intent, "b");
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = QueryCache::new(0);
        cache.put("first", None, parsed("a"));
        assert!(cache.get("first", None).is_none());
        assert!(cache.is_empty());
    }
}
