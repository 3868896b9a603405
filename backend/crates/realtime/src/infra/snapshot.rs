//! Counter-backed snapshot source
//!
//! Collaborators (booking, enquiry and job handlers) bump named counters;
//! snapshot replies read them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kernel::clock::SharedClock;
use parking_lot::RwLock;
use serde_json::{Value, json};

use crate::domain::snapshot::SnapshotSource;
use crate::error::RouterError;

pub struct InMemorySnapshotSource {
    counters: RwLock<BTreeMap<String, i64>>,
    started_at: i64,
    clock: SharedClock,
}

impl InMemorySnapshotSource {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            started_at: clock.now_ms(),
            clock,
        }
    }

    pub fn set(&self, name: &str, value: i64) {
        self.counters.write().insert(name.to_string(), value);
    }

    pub fn increment(&self, name: &str, by: i64) -> i64 {
        let mut counters = self.counters.write();
        let entry = counters.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(by);
        *entry
    }

    pub fn get(&self, name: &str) -> i64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotSource for InMemorySnapshotSource {
    async fn analytics(&self) -> Result<Value, RouterError> {
        let counts = self.counters.read().clone();
        Ok(json!({
            "counts": counts,
            "generatedAt": self.clock.now_ms(),
        }))
    }

    async fn system_status(&self) -> Result<Value, RouterError> {
        let now = self.clock.now_ms();
        Ok(json!({
            "status": "ok",
            "uptimeMs": now.saturating_sub(self.started_at),
            "serverTime": now,
        }))
    }
}
