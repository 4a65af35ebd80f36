//! In-memory caching of successful resource fetches
//!
//! The cache is an explicitly owned object injected into the aggregator, not
//! ambient global state. It stores only successful fetch results keyed by
//! (resource type, patient id), bounded by process lifetime with no eviction,
//! and never records failures or timeouts.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

type CacheKey = (&'static str, String);

/// Cache of successful resource searches
#[derive(Default)]
pub struct SummaryCache {
    entries: RwLock<HashMap<CacheKey, Vec<Value>>>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, resource_type: &'static str, patient_id: &str) -> Option<Vec<Value>> {
        self.entries
            .read()
            .await
            .get(&(resource_type, patient_id.to_string()))
            .cloned()
    }

    pub async fn insert(&self, resource_type: &'static str, patient_id: &str, records: Vec<Value>) {
        self.entries
            .write()
            .await
            .insert((resource_type, patient_id.to_string()), records);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
