//! 键值持久化模块
//!
//! 异步键值存储接口，语义为"最终持久化、后写覆盖、变更通知"。
//! 分为两个命名空间：`sync`（设置、单词列表）和 `local`（翻译缓存、词典缓存）。

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use redb::{Database, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::translation::error::{TranslationError, TranslationResult};

const SYNC_TABLE: TableDefinition<&str, &str> = TableDefinition::new("vocab_sync");
const LOCAL_TABLE: TableDefinition<&str, &str> = TableDefinition::new("vocab_local");

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// 一次键值变更
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// 键值存储
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取多个键，不存在的键不出现在结果中
    async fn get(&self, keys: &[&str]) -> TranslationResult<HashMap<String, Value>>;

    /// 写入多个键
    async fn set(&self, items: HashMap<String, Value>) -> TranslationResult<()>;

    /// 删除多个键
    async fn remove(&self, keys: &[&str]) -> TranslationResult<()>;

    /// 订阅变更通知
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// 读取单个键并反序列化
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> TranslationResult<Option<T>> {
    let mut values = store.get(&[key]).await?;
    match values.remove(key) {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// 序列化并写入单个键
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> TranslationResult<()> {
    let mut items = HashMap::new();
    items.insert(key.to_string(), serde_json::to_value(value)?);
    store.set(items).await
}

/// 内存存储
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> TranslationResult<HashMap<String, Value>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> TranslationResult<()> {
        let changes: Vec<StorageChange> = {
            let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            items
                .into_iter()
                .map(|(key, value)| {
                    let old_value = values.insert(key.clone(), value.clone());
                    StorageChange {
                        key,
                        old_value,
                        new_value: Some(value),
                    }
                })
                .collect()
        };

        for change in changes {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> TranslationResult<()> {
        let changes: Vec<StorageChange> = {
            let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            keys.iter()
                .filter_map(|key| {
                    values.remove(*key).map(|old| StorageChange {
                        key: key.to_string(),
                        old_value: Some(old),
                        new_value: None,
                    })
                })
                .collect()
        };

        for change in changes {
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

fn storage_err(error: impl Into<redb::Error>) -> TranslationError {
    TranslationError::from(error.into())
}

fn parse_stored(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("存储中的值无法解析 {}: {}", key, e);
            None
        }
    }
}

/// 基于 redb 的磁盘存储
///
/// redb 的操作是阻塞的，全部放到 `spawn_blocking` 中执行。
pub struct RedbStore {
    db: Arc<Database>,
    table: TableDefinition<'static, &'static str, &'static str>,
    changes: broadcast::Sender<StorageChange>,
}

impl RedbStore {
    fn with_table(
        db: Arc<Database>,
        table: TableDefinition<'static, &'static str, &'static str>,
    ) -> TranslationResult<Self> {
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            // 打开即创建
            let _table = write_txn.open_table(table).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { db, table, changes })
    }

    fn notify(&self, changes: Vec<StorageChange>) {
        for change in changes {
            let _ = self.changes.send(change);
        }
    }
}

async fn run_blocking<T, F>(task: F) -> TranslationResult<T>
where
    F: FnOnce() -> TranslationResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| TranslationError::InternalError(format!("存储任务失败: {}", e)))?
}

#[async_trait]
impl KeyValueStore for RedbStore {
    async fn get(&self, keys: &[&str]) -> TranslationResult<HashMap<String, Value>> {
        let db = Arc::clone(&self.db);
        let table_def = self.table;
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        run_blocking(move || {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let table = read_txn.open_table(table_def).map_err(storage_err)?;

            let mut found = HashMap::new();
            for key in keys {
                if let Some(raw) = table.get(key.as_str()).map_err(storage_err)? {
                    if let Some(value) = parse_stored(&key, raw.value()) {
                        found.insert(key, value);
                    }
                }
            }
            Ok(found)
        })
        .await
    }

    async fn set(&self, items: HashMap<String, Value>) -> TranslationResult<()> {
        let db = Arc::clone(&self.db);
        let table_def = self.table;
        let items: Vec<(String, Value, String)> = items
            .into_iter()
            .map(|(key, value)| {
                let raw = serde_json::to_string(&value)?;
                Ok((key, value, raw))
            })
            .collect::<TranslationResult<_>>()?;

        let changes = run_blocking(move || {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let mut changes = Vec::with_capacity(items.len());
            {
                let mut table = write_txn.open_table(table_def).map_err(storage_err)?;
                for (key, value, raw) in items {
                    let old_value = table
                        .insert(key.as_str(), raw.as_str())
                        .map_err(storage_err)?
                        .and_then(|old| parse_stored(&key, old.value()));
                    changes.push(StorageChange {
                        key,
                        old_value,
                        new_value: Some(value),
                    });
                }
            }
            write_txn.commit().map_err(storage_err)?;
            Ok(changes)
        })
        .await?;

        self.notify(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> TranslationResult<()> {
        let db = Arc::clone(&self.db);
        let table_def = self.table;
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let changes = run_blocking(move || {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let mut changes = Vec::new();
            {
                let mut table = write_txn.open_table(table_def).map_err(storage_err)?;
                for key in keys {
                    let old = table
                        .remove(key.as_str())
                        .map_err(storage_err)?
                        .and_then(|old| parse_stored(&key, old.value()));
                    if old.is_some() {
                        changes.push(StorageChange {
                            key,
                            old_value: old,
                            new_value: None,
                        });
                    }
                }
            }
            write_txn.commit().map_err(storage_err)?;
            Ok(changes)
        })
        .await?;

        self.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// 两个存储命名空间
#[derive(Clone)]
pub struct StorageAreas {
    /// 小容量同步区：用户设置、单词列表、统计
    pub sync: Arc<dyn KeyValueStore>,
    /// 本地区：翻译缓存、词典缓存
    pub local: Arc<dyn KeyValueStore>,
}

impl StorageAreas {
    pub fn new(sync: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { sync, local }
    }

    /// 纯内存存储，进程退出后丢失
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// 打开（或创建）redb 文件，两个命名空间各占一张表
    pub fn open_redb<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Arc::new(Database::create(path).map_err(storage_err)?);
        tracing::info!("打开持久化存储: {}", path.display());

        Ok(Self::new(
            Arc::new(RedbStore::with_table(Arc::clone(&db), SYNC_TABLE)?),
            Arc::new(RedbStore::with_table(db, LOCAL_TABLE)?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_round_trip_and_changes() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        save_json(&store, "stats", &json!({"cacheHits": 1})).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "stats");
        assert!(change.old_value.is_none());

        let loaded: Option<Value> = load_json(&store, "stats").await.unwrap();
        assert_eq!(loaded, Some(json!({"cacheHits": 1})));

        store.remove(&["stats", "missing"]).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert!(change.new_value.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.redb");

        {
            let areas = StorageAreas::open_redb(&path).unwrap();
            save_json(areas.local.as_ref(), "k", &vec!["a", "b"]).await.unwrap();
            save_json(areas.sync.as_ref(), "k", &"sync").await.unwrap();
        }

        let areas = StorageAreas::open_redb(&path).unwrap();
        let local: Option<Vec<String>> = load_json(areas.local.as_ref(), "k").await.unwrap();
        let sync: Option<String> = load_json(areas.sync.as_ref(), "k").await.unwrap();
        assert_eq!(local, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(sync.as_deref(), Some("sync"));

        areas.local.remove(&["k"]).await.unwrap();
        let gone: Option<Vec<String>> = load_json(areas.local.as_ref(), "k").await.unwrap();
        assert!(gone.is_none());
    }
}
