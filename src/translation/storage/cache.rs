//! 单词翻译缓存模块
//!
//! 有界 LRU 缓存，键为 (单词, 源语言, 目标语言)，持久化到本地存储区。
//!
//! - 内存中的缓存是权威数据，持久化只是尽力而为
//! - 写入经过防抖合并，只写最新快照
//! - `init` 只会真正执行一次，并发调用者共享同一次加载

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::kv::{load_json, save_json, KeyValueStore};
use crate::translation::config::{constants, VocabConfig};
use crate::translation::error::helpers::log_error;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存键，单词在构造时统一转为小写
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub word: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl CacheKey {
    pub fn new(word: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            word: word.trim().to_lowercase(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheEntry {
    pub translation: String,
    pub phonetic: String,
    pub difficulty: String,
    pub part_of_speech: String,
    pub short_definition: String,
    pub example: String,
    /// 写入时间（Unix 毫秒）
    pub timestamp: i64,
}

impl CacheEntry {
    /// 以当前时间创建条目
    pub fn new(translation: &str, difficulty: &str) -> Self {
        Self {
            translation: translation.to_string(),
            difficulty: difficulty.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }
}

/// 持久化记录，按从旧到新的顺序保存
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    key: CacheKey,
    entry: CacheEntry,
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    pub max_size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

struct CacheInner {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    initialized: OnceCell<()>,
    persist_pending: AtomicBool,
    debounce: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// 单词缓存，克隆后共享同一份数据
#[derive(Clone)]
pub struct WordCache {
    inner: Arc<CacheInner>,
}

fn capacity(max_size: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN)
}

// ============================================================================
// 实现
// ============================================================================

impl WordCache {
    /// 创建缓存
    pub fn new(store: Arc<dyn KeyValueStore>, max_size: usize, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(LruCache::new(capacity(max_size))),
                store,
                storage_key: constants::CACHE_STORAGE_KEY.to_string(),
                initialized: OnceCell::new(),
                persist_pending: AtomicBool::new(false),
                debounce,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &VocabConfig) -> Self {
        Self::new(store, config.cache_max_size, config.persist_debounce())
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 从持久化存储加载，只执行一次
    pub async fn init(&self) {
        self.inner
            .initialized
            .get_or_init(|| async {
                self.load().await;
            })
            .await;
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.initialized()
    }

    async fn load(&self) {
        let persisted: Vec<PersistedEntry> =
            match load_json(self.inner.store.as_ref(), &self.inner.storage_key).await {
                Ok(Some(entries)) => entries,
                Ok(None) => Vec::new(),
                Err(e) => {
                    log_error(&e.with_context("加载单词缓存"));
                    Vec::new()
                }
            };

        let persisted_len = persisted.len();
        let trimmed = {
            let mut entries = self.entries();
            let mut fresh = LruCache::new(entries.cap());
            for item in persisted {
                fresh.put(item.key, item.entry);
            }
            // 加载期间写入的条目更新，放在最前
            for (key, entry) in entries.iter().rev() {
                fresh.put(key.clone(), entry.clone());
            }
            *entries = fresh;
            persisted_len > entries.cap().get()
        };

        tracing::info!("单词缓存已加载 {} 条", persisted_len);
        if trimmed {
            tracing::debug!("持久化缓存超过容量，已裁剪");
            self.schedule_persist();
        }
    }

    /// 查找条目，命中时刷新最近使用顺序
    pub fn get(&self, word: &str, source_lang: &str, target_lang: &str) -> Option<CacheEntry> {
        let key = CacheKey::new(word, source_lang, target_lang);
        let found = self.entries().get(&key).cloned();
        match found {
            Some(_) => self.inner.hits.fetch_add(1, Ordering::Relaxed),
            None => self.inner.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// 查找条目但不影响最近使用顺序
    pub fn peek(&self, word: &str, source_lang: &str, target_lang: &str) -> Option<CacheEntry> {
        let key = CacheKey::new(word, source_lang, target_lang);
        self.entries().peek(&key).cloned()
    }

    /// 写入条目
    pub fn set(&self, word: &str, source_lang: &str, target_lang: &str, entry: CacheEntry) {
        let key = CacheKey::new(word, source_lang, target_lang);
        if let Some((evicted, _)) = self.entries().push(key.clone(), entry) {
            if evicted != key {
                tracing::trace!("淘汰缓存条目: {}", evicted.word);
            }
        }
        self.schedule_persist();
    }

    /// 批量写入，只触发一次持久化
    pub fn set_many<I>(&self, items: I)
    where
        I: IntoIterator<Item = (CacheKey, CacheEntry)>,
    {
        {
            let mut entries = self.entries();
            for (key, entry) in items {
                let key = CacheKey::new(&key.word, &key.source_lang, &key.target_lang);
                entries.put(key, entry);
            }
        }
        self.schedule_persist();
    }

    /// 清空缓存并删除持久化数据
    pub async fn clear(&self) {
        // 取消尚未执行的防抖写入，避免把空快照写回
        self.inner.persist_pending.store(false, Ordering::SeqCst);
        self.entries().clear();
        if let Err(e) = self.inner.store.remove(&[self.inner.storage_key.as_str()]).await {
            log_error(&e.with_context("删除持久化缓存"));
        }
    }

    /// 调整容量，溢出部分按最久未使用的顺序淘汰
    pub fn set_max_size(&self, max_size: usize) {
        let overflow = {
            let mut entries = self.entries();
            let overflow = entries.len().saturating_sub(max_size.max(1));
            entries.resize(capacity(max_size));
            overflow
        };
        if overflow > 0 {
            tracing::debug!("缩小缓存容量，淘汰 {} 条", overflow);
            self.schedule_persist();
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.entries().cap().get()
    }

    /// 按从新到旧的顺序列出键，不影响最近使用顺序
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries().iter().map(|(key, _)| key.clone()).collect()
    }

    /// 某个语言对下所有已缓存的单词
    pub fn cached_words(&self, source_lang: &str, target_lang: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter(|(key, _)| key.source_lang == source_lang && key.target_lang == target_lang)
            .map(|(key, _)| key.word.clone())
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            cache_hits: self.inner.hits.load(Ordering::Relaxed),
            cache_misses: self.inner.misses.load(Ordering::Relaxed),
            total_entries: entries.len(),
            max_size: entries.cap().get(),
        }
    }

    /// 立即写入持久化存储
    pub async fn flush(&self) {
        self.inner.persist_pending.store(false, Ordering::SeqCst);
        Self::persist(&self.inner).await;
    }

    /// 安排一次防抖持久化；已有待执行的写入时直接合并
    fn schedule_persist(&self) {
        if self.inner.persist_pending.swap(true, Ordering::SeqCst) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(inner.debounce).await;
                    if inner.persist_pending.swap(false, Ordering::SeqCst) {
                        Self::persist(&inner).await;
                    }
                });
            }
            Err(_) => {
                self.inner.persist_pending.store(false, Ordering::SeqCst);
                tracing::debug!("没有异步运行时，跳过缓存持久化");
            }
        }
    }

    async fn persist(inner: &CacheInner) {
        let snapshot: Vec<PersistedEntry> = {
            let entries = inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .rev()
                .map(|(key, entry)| PersistedEntry {
                    key: key.clone(),
                    entry: entry.clone(),
                })
                .collect()
        };

        match save_json(inner.store.as_ref(), &inner.storage_key, &snapshot).await {
            Ok(()) => tracing::debug!("单词缓存已持久化 {} 条", snapshot.len()),
            Err(e) => log_error(&e.with_context("持久化单词缓存")),
        }
    }
}
