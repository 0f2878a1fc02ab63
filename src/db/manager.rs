//! Connection manager: the process-wide registry of database handles.
//!
//! Two lifecycle modes. Eager (default) opens every configured pool during
//! `connect()`. Lazy opens one pool per distinct dialect as a health-check
//! sample and defers the rest to the first `get_database` call, which opens
//! on demand under a double-checked write lock.

use crate::db::pool::DatabaseHandle;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionSpec, DatabaseType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
struct Inner {
    configs: HashMap<String, ConnectionSpec>,
    connections: HashMap<String, Arc<DatabaseHandle>>,
    lazy_loading: bool,
}

/// Keyed registry of database handles.
pub struct ConnectionManager {
    inner: RwLock<Inner>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register validated connection specs. IDs must be unique.
    pub async fn load_config(&self, specs: Vec<ConnectionSpec>) -> DbResult<()> {
        let mut inner = self.inner.write().await;
        for mut spec in specs {
            spec.validate().map_err(DbError::config)?;
            spec.apply_defaults();
            if inner.configs.contains_key(&spec.id) {
                return Err(DbError::config(format!(
                    "duplicate database connection ID: {}",
                    spec.id
                )));
            }
            inner.configs.insert(spec.id.clone(), spec);
        }
        Ok(())
    }

    /// Enable or disable lazy loading. Recommended with many connections.
    pub async fn set_lazy_loading(&self, enabled: bool) {
        let mut inner = self.inner.write().await;
        inner.lazy_loading = enabled;
        if enabled {
            info!("lazy loading enabled: connections will be established on first use");
        }
    }

    pub async fn is_lazy_loading(&self) -> bool {
        self.inner.read().await.lazy_loading
    }

    /// Establish connections per the configured lifecycle mode.
    ///
    /// Eager mode opens every pool; the first failure is returned with
    /// already-opened handles left in place. Lazy mode opens exactly one
    /// pool per distinct dialect to validate credentials and drivers.
    pub async fn connect(&self) -> DbResult<()> {
        let mut inner = self.inner.write().await;

        if inner.lazy_loading {
            let mut samples: HashMap<DatabaseType, String> = HashMap::new();
            let mut ids: Vec<&String> = inner.configs.keys().collect();
            ids.sort();
            for id in ids {
                let db_type = inner.configs[id.as_str()].db_type;
                samples.entry(db_type).or_insert_with(|| id.to_string());
            }

            for (db_type, id) in samples {
                if inner.connections.contains_key(&id) {
                    continue;
                }
                info!(db_type = %db_type, id = %id, "health check: opening sample connection");
                let spec = inner.configs[&id].clone();
                let handle = DatabaseHandle::open(&spec).await.map_err(|e| {
                    DbError::connection(format!(
                        "health check failed for {} database {}: {}",
                        db_type, id, e
                    ))
                })?;
                inner.connections.insert(id, Arc::new(handle));
            }

            info!(
                validated = inner.connections.len(),
                deferred = inner.configs.len() - inner.connections.len(),
                "health check complete"
            );
            return Ok(());
        }

        let mut ids: Vec<String> = inner.configs.keys().cloned().collect();
        ids.sort();
        for id in ids {
            if inner.connections.contains_key(&id) {
                continue;
            }
            let spec = inner.configs[&id].clone();
            let handle = DatabaseHandle::open(&spec).await.map_err(|e| {
                DbError::connection(format!("failed to connect to database {}: {}", id, e))
            })?;
            inner.connections.insert(id, Arc::new(handle));
        }
        Ok(())
    }

    /// Look up a handle; in lazy mode a miss opens the pool on demand.
    pub async fn get_database(&self, id: &str) -> DbResult<Arc<DatabaseHandle>> {
        {
            let inner = self.inner.read().await;
            if let Some(handle) = inner.connections.get(id) {
                return Ok(handle.clone());
            }
            if !inner.lazy_loading {
                return Err(DbError::connection(format!(
                    "database connection {} not found",
                    id
                )));
            }
        }
        self.connect_on_demand(id).await
    }

    async fn connect_on_demand(&self, id: &str) -> DbResult<Arc<DatabaseHandle>> {
        let mut inner = self.inner.write().await;

        // Another task may have opened it while we waited for the lock.
        if let Some(handle) = inner.connections.get(id) {
            return Ok(handle.clone());
        }

        let spec = inner
            .configs
            .get(id)
            .ok_or_else(|| DbError::connection(format!("database configuration {} not found", id)))?
            .clone();

        info!(id = %id, "lazy loading: opening connection on first use");
        let handle = Arc::new(DatabaseHandle::open(&spec).await?);
        inner.connections.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// The dialect tag for a configured database. Never opens a pool.
    pub async fn get_database_type(&self, id: &str) -> DbResult<DatabaseType> {
        let inner = self.inner.read().await;
        inner
            .configs
            .get(id)
            .map(|spec| spec.db_type)
            .ok_or_else(|| DbError::connection(format!("database configuration {} not found", id)))
    }

    /// All configured database IDs, sorted.
    pub async fn list_databases(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner.configs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// IDs of databases whose pool is currently open.
    pub async fn connected_databases(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner.connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close one connection and drop it from the registry.
    pub async fn close(&self, id: &str) -> DbResult<()> {
        let handle = {
            let mut inner = self.inner.write().await;
            inner
                .connections
                .remove(id)
                .ok_or_else(|| DbError::connection(format!("database connection {} not found", id)))?
        };
        handle.close().await;
        Ok(())
    }

    /// Close every connection, logging failures and clearing the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<DatabaseHandle>)> = {
            let mut inner = self.inner.write().await;
            inner.connections.drain().collect()
        };
        for (id, handle) in drained {
            info!(id = %id, "closing connection");
            handle.close().await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_spec(id: &str) -> ConnectionSpec {
        let mut spec = ConnectionSpec::new(id, DatabaseType::Sqlite);
        spec.database_path = Some(":memory:".to_string());
        spec
    }

    #[tokio::test]
    async fn test_empty_manager() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.list_databases().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_database_not_found() {
        let manager = ConnectionManager::new();
        let err = manager.get_database("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let manager = ConnectionManager::new();
        let err = manager
            .load_config(vec![memory_spec("a"), memory_spec("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Config { .. }));
    }

    #[tokio::test]
    async fn test_eager_connect_opens_all() {
        let manager = ConnectionManager::new();
        manager
            .load_config(vec![memory_spec("a"), memory_spec("b")])
            .await
            .unwrap();
        manager.connect().await.unwrap();
        assert_eq!(manager.connection_count().await, 2);
        manager.close_all().await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_lazy_connect_samples_one_per_dialect() {
        let manager = ConnectionManager::new();
        manager
            .load_config(vec![memory_spec("a"), memory_spec("b"), memory_spec("c")])
            .await
            .unwrap();
        manager.set_lazy_loading(true).await;
        manager.connect().await.unwrap();
        // One dialect in play, so exactly one sample connection.
        assert_eq!(manager.connection_count().await, 1);

        // Set of known databases is unchanged by lazy loading.
        assert_eq!(manager.list_databases().await, vec!["a", "b", "c"]);

        let _ = manager.get_database("c").await.unwrap();
        assert!(manager.connection_count().await >= 2);
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_get_database_type_without_open() {
        let manager = ConnectionManager::new();
        manager.load_config(vec![memory_spec("a")]).await.unwrap();
        let db_type = manager.get_database_type("a").await.unwrap();
        assert_eq!(db_type, DatabaseType::Sqlite);
        // No pool was opened by the type lookup.
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_lazy_open_single_handle() {
        let manager = Arc::new(ConnectionManager::new());
        manager.load_config(vec![memory_spec("a")]).await.unwrap();
        manager.set_lazy_loading(true).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let m = manager.clone();
            tasks.push(tokio::spawn(async move { m.get_database("a").await }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }
        // All callers observe the same handle instance.
        let first = &handles[0];
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(first, handle));
        }
        assert_eq!(manager.connection_count().await, 1);
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_close_removes_entry() {
        let manager = ConnectionManager::new();
        manager.load_config(vec![memory_spec("a")]).await.unwrap();
        manager.connect().await.unwrap();
        manager.close("a").await.unwrap();
        assert!(manager.close("a").await.is_err());
    }
}
