//! Node-type name to id lookup cache
//!
//! Read-through and non-authoritative: a miss (or an expired entry) goes to
//! the `node_types` table, and dropping the cache only costs a reload.
//! Entries expire after a fixed TTL so renamed types are eventually picked up.
//! Owned by the service state and injected where needed; there is no global
//! instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, Copy)]
struct CachedId {
    id: i64,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct NodeTypeCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedId>>,
}

impl NodeTypeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a type name to its id, loading from the database on a miss.
    ///
    /// Unknown names are not cached, so a type created later is found on the
    /// next lookup.
    pub async fn resolve(&self, pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
        if let Some(id) = self.get_cached(name).await {
            return Ok(Some(id));
        }

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM node_types WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        if let Some(id) = id {
            tracing::debug!(node_type = name, id, "Cached node type id");
            self.entries.write().await.insert(
                name.to_string(),
                CachedId {
                    id,
                    loaded_at: Instant::now(),
                },
            );
        }

        Ok(id)
    }

    /// Cached id if present and not expired
    pub async fn get_cached(&self, name: &str) -> Option<i64> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| entry.id)
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
