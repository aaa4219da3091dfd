//! 学习统计与已掌握单词
//!
//! 统计计数器持久化在同步区的单个键下，写入串行执行，失败只记录日志。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

use super::kv::{load_json, save_json, KeyValueStore};
use crate::translation::config::constants;
use crate::translation::error::helpers::log_error;

/// 持久化的使用统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub new_words_learned: u64,
}

impl UsageStats {
    fn add(&mut self, delta: &UsageStats) {
        self.cache_hits += delta.cache_hits;
        self.cache_misses += delta.cache_misses;
        self.new_words_learned += delta.new_words_learned;
    }
}

struct StatsInner {
    store: Arc<dyn KeyValueStore>,
    write_lock: AsyncMutex<()>,
    session_hits: AtomicU64,
    session_misses: AtomicU64,
    session_new_words: AtomicU64,
}

/// 统计记录器
#[derive(Clone)]
pub struct StatsRecorder {
    inner: Arc<StatsInner>,
}

impl StatsRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(StatsInner {
                store,
                write_lock: AsyncMutex::new(()),
                session_hits: AtomicU64::new(0),
                session_misses: AtomicU64::new(0),
                session_new_words: AtomicU64::new(0),
            }),
        }
    }

    /// 一批缓存命中
    pub fn record_cache_hit(&self) {
        self.record(UsageStats {
            cache_hits: 1,
            ..Default::default()
        });
    }

    /// 一次远程往返，以及其中得到的新单词数
    pub fn record_remote_round_trip(&self, new_words: u64) {
        self.record(UsageStats {
            cache_misses: 1,
            new_words_learned: new_words,
            ..Default::default()
        });
    }

    /// 记录增量，持久化在后台完成
    pub fn record(&self, delta: UsageStats) {
        self.inner.session_hits.fetch_add(delta.cache_hits, Ordering::Relaxed);
        self.inner.session_misses.fetch_add(delta.cache_misses, Ordering::Relaxed);
        self.inner
            .session_new_words
            .fetch_add(delta.new_words_learned, Ordering::Relaxed);

        metrics::counter!("vocabweave_cache_hits_total").increment(delta.cache_hits);
        metrics::counter!("vocabweave_cache_misses_total").increment(delta.cache_misses);
        metrics::counter!("vocabweave_new_words_total").increment(delta.new_words_learned);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let recorder = self.clone();
                handle.spawn(async move { recorder.persist_delta(delta).await });
            }
            Err(_) => tracing::debug!("没有异步运行时，统计只保留在内存中"),
        }
    }

    /// 串行地读取、累加、写回
    pub async fn persist_delta(&self, delta: UsageStats) {
        let _guard = self.inner.write_lock.lock().await;
        let mut stats = self.load().await;
        stats.add(&delta);
        if let Err(e) = save_json(self.inner.store.as_ref(), constants::STATS_STORAGE_KEY, &stats).await {
            log_error(&e.with_context("写入学习统计"));
        }
    }

    /// 读取持久化的累计统计
    pub async fn load(&self) -> UsageStats {
        match load_json(self.inner.store.as_ref(), constants::STATS_STORAGE_KEY).await {
            Ok(stats) => stats.unwrap_or_default(),
            Err(e) => {
                log_error(&e.with_context("读取学习统计"));
                UsageStats::default()
            }
        }
    }

    /// 本次会话的统计
    pub fn session_totals(&self) -> UsageStats {
        UsageStats {
            cache_hits: self.inner.session_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.session_misses.load(Ordering::Relaxed),
            new_words_learned: self.inner.session_new_words.load(Ordering::Relaxed),
        }
    }
}

/// 用户标记为已掌握的单词
pub struct LearnedWords {
    store: Arc<dyn KeyValueStore>,
    words: RwLock<HashSet<String>>,
    loaded: OnceCell<()>,
}

impl LearnedWords {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            words: RwLock::new(HashSet::new()),
            loaded: OnceCell::new(),
        }
    }

    /// 从同步区加载，只执行一次
    pub async fn init(&self) {
        self.loaded
            .get_or_init(|| async {
                let stored: Vec<String> =
                    match load_json(self.store.as_ref(), constants::LEARNED_WORDS_KEY).await {
                        Ok(words) => words.unwrap_or_default(),
                        Err(e) => {
                            log_error(&e.with_context("读取已掌握单词"));
                            Vec::new()
                        }
                    };
                let mut words = self.words.write().unwrap_or_else(PoisonError::into_inner);
                words.extend(stored.into_iter().map(|w| w.to_lowercase()));
            })
            .await;
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&word.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 标记单词，返回是否为新加入
    pub async fn add(&self, word: &str) -> bool {
        let inserted = self
            .words
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(word.trim().to_lowercase());
        if inserted {
            self.persist().await;
        }
        inserted
    }

    pub async fn remove(&self, word: &str) -> bool {
        let removed = self
            .words
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&word.trim().to_lowercase());
        if removed {
            self.persist().await;
        }
        removed
    }

    async fn persist(&self) {
        let mut snapshot: Vec<String> = self
            .words
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        snapshot.sort();

        if let Err(e) = save_json(self.store.as_ref(), constants::LEARNED_WORDS_KEY, &snapshot).await {
            log_error(&e.with_context("写入已掌握单词"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::storage::kv::MemoryStore;

    #[tokio::test]
    async fn test_persisted_stats_accumulate() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let recorder = StatsRecorder::new(Arc::clone(&store));

        recorder
            .persist_delta(UsageStats { cache_hits: 1, ..Default::default() })
            .await;
        recorder
            .persist_delta(UsageStats { cache_misses: 1, new_words_learned: 3, ..Default::default() })
            .await;

        let stats = recorder.load().await;
        assert_eq!(stats, UsageStats { cache_hits: 1, cache_misses: 1, new_words_learned: 3 });
    }

    #[test]
    fn test_session_totals_without_runtime() {
        let recorder = StatsRecorder::new(Arc::new(MemoryStore::new()));
        recorder.record_cache_hit();
        recorder.record_remote_round_trip(2);
        assert_eq!(
            recorder.session_totals(),
            UsageStats { cache_hits: 1, cache_misses: 1, new_words_learned: 2 }
        );
    }

    #[tokio::test]
    async fn test_learned_words_round_trip() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let learned = LearnedWords::new(Arc::clone(&store));
        learned.init().await;
        assert!(learned.add("Technology").await);
        assert!(!learned.add("technology").await);

        let reloaded = LearnedWords::new(store);
        reloaded.init().await;
        assert!(reloaded.contains("TECHNOLOGY"));
        assert_eq!(reloaded.len(), 1);
    }
}
