//! Append-only in-memory store
//!
//! Audit trail for readings, alerts, and events. Appends are atomic and
//! immediately visible to subsequent reads in-process; there is no isolation
//! or rollback. State is dumped to JSON on shutdown and can be reloaded, but
//! nothing in the core depends on it for correctness.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CareError, Result};

/// Well-known table names
pub mod tables {
    pub const HEALTH_DATA: &str = "health_data";
    pub const SAFETY_DATA: &str = "safety_data";
    pub const REMINDERS: &str = "reminders";
    pub const ALERTS: &str = "alerts";
    pub const EVENTS: &str = "events";
}

/// A stored record with its assigned id and creation stamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Table {
    next_id: u64,
    rows: Vec<StoredRecord>,
}

/// Append-only store of named tables
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    /// Create a store with the standard tables
    pub fn new() -> Self {
        let mut map = HashMap::new();
        for name in [
            tables::HEALTH_DATA,
            tables::SAFETY_DATA,
            tables::REMINDERS,
            tables::ALERTS,
            tables::EVENTS,
        ] {
            map.insert(name.to_string(), Table::default());
        }
        Self {
            tables: RwLock::new(map),
        }
    }

    /// Append a record. The table is created on first use.
    pub async fn insert(&self, table: &str, record: serde_json::Value) -> u64 {
        let fields = match record {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let mut tables = self.tables.write().await;
        let table = tables.entry(table.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;
        table.rows.push(StoredRecord {
            id,
            created_at: Utc::now(),
            fields,
        });
        id
    }

    /// Query a table, filtering on exact field equality, newest-first when
    /// `desc`, optionally limited.
    pub async fn query(
        &self,
        table: &str,
        conditions: &[(&str, serde_json::Value)],
        desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<StoredRecord>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table)
            .ok_or_else(|| CareError::UnknownTable(table.to_string()))?;

        let mut rows: Vec<StoredRecord> = table
            .rows
            .iter()
            .filter(|row| {
                conditions
                    .iter()
                    .all(|(field, value)| row.fields.get(*field) == Some(value))
            })
            .cloned()
            .collect();

        if desc {
            rows.reverse();
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    /// Number of rows in a table (0 for unknown tables)
    pub async fn count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Dump all tables to a JSON file
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tables = self.tables.read().await;
        let json = serde_json::to_string_pretty(&*tables)?;
        std::fs::write(path, json)?;
        info!("Store saved to {}", path.display());
        Ok(())
    }

    /// Load tables from a JSON file, replacing current contents
    pub async fn load_from(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Store file not found: {}", path.display());
            return Ok(());
        }
        let json = std::fs::read_to_string(path)?;
        let loaded: HashMap<String, Table> = serde_json::from_str(&json)?;
        let mut tables = self.tables.write().await;
        *tables = loaded;
        info!("Store loaded from {}", path.display());
        Ok(())
    }

    /// Record an audit event for a user
    pub async fn record_event(&self, user_id: &str, event_type: &str, details: serde_json::Value) {
        let id = self
            .insert(
                tables::EVENTS,
                serde_json::json!({
                    "user_id": user_id,
                    "event_type": event_type,
                    "details": details,
                }),
            )
            .await;
        debug!("Recorded {} event #{} for user {}", event_type, id, user_id);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store
            .insert(tables::EVENTS, serde_json::json!({"user_id": "U1"}))
            .await;
        let b = store
            .insert(tables::EVENTS, serde_json::json!({"user_id": "U1"}))
            .await;
        assert!(b > a);
        assert_eq!(store.count(tables::EVENTS).await, 2);
    }

    #[tokio::test]
    async fn test_query_conditions_and_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert(
                    tables::ALERTS,
                    serde_json::json!({"user_id": "U1", "n": i}),
                )
                .await;
        }
        store
            .insert(
                tables::ALERTS,
                serde_json::json!({"user_id": "U2", "n": 99}),
            )
            .await;

        let rows = store
            .query(
                tables::ALERTS,
                &[("user_id", serde_json::json!("U1"))],
                true,
                Some(2),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].fields["n"], serde_json::json!(4));
    }

    #[tokio::test]
    async fn test_unknown_table_is_soft_error() {
        let store = MemoryStore::new();
        let err = store.query("nope", &[], false, None).await.unwrap_err();
        assert!(matches!(err, CareError::UnknownTable(_)));
    }
}
