//! 单词缓存集成测试
//!
//! 测试 LRU 淘汰、单次初始化和持久化行为

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use vocabweave::translation::constants;
use vocabweave::translation::storage::{CacheEntry, CacheKey, KeyValueStore, MemoryStore, StorageAreas, WordCache};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{seed, FailingStore};

fn words(cache: &WordCache) -> HashSet<String> {
    cache.keys().into_iter().map(|key| key.word).collect()
}

/// 淘汰总是移除最久未访问的键
#[test]
fn test_lru_keeps_most_recently_touched() {
    let cache = WordCache::new(Arc::new(MemoryStore::new()), 3, Duration::from_millis(10));
    for word in ["alpha", "bravo", "charlie"] {
        seed(&cache, word, "en", "zh-CN", word, "B1");
    }
    assert!(cache.get("alpha", "en", "zh-CN").is_some());

    seed(&cache, "delta", "en", "zh-CN", "delta", "B1");
    assert_eq!(words(&cache), HashSet::from(["alpha", "charlie", "delta"].map(String::from)));

    seed(&cache, "echo", "en", "zh-CN", "echo", "B1");
    assert_eq!(words(&cache), HashSet::from(["alpha", "delta", "echo"].map(String::from)));
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_overwrite_bumps_recency_without_growing() {
    let cache = WordCache::new(Arc::new(MemoryStore::new()), 2, Duration::from_millis(10));
    seed(&cache, "alpha", "en", "zh-CN", "一", "B1");
    seed(&cache, "bravo", "en", "zh-CN", "二", "B1");
    seed(&cache, "Alpha", "en", "zh-CN", "甲", "B2");
    seed(&cache, "charlie", "en", "zh-CN", "三", "B1");

    assert_eq!(cache.len(), 2);
    assert!(cache.peek("bravo", "en", "zh-CN").is_none());
    assert_eq!(cache.peek("alpha", "en", "zh-CN").unwrap().translation, "甲");
}

#[tokio::test]
async fn test_flush_and_reload_preserves_order() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    cache.init().await;
    seed(&cache, "first", "en", "zh-CN", "第一", "B1");
    seed(&cache, "second", "en", "zh-CN", "第二", "B1");
    seed(&cache, "third", "en", "zh-CN", "第三", "B1");
    cache.flush().await;

    let reloaded = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    reloaded.init().await;
    let keys: Vec<String> = reloaded.keys().into_iter().map(|key| key.word).collect();
    assert_eq!(keys, vec!["third", "second", "first"]);
    assert_eq!(reloaded.peek("second", "en", "zh-CN").unwrap().translation, "第二");
}

/// 持久化的条目超过当前容量时按从旧到新裁剪
#[tokio::test]
async fn test_init_trims_to_lowered_limit() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    cache.set_many((0..6).map(|i| {
        (
            CacheKey::new(&format!("word{}", i), "en", "zh-CN"),
            CacheEntry::new(&format!("词{}", i), "B1"),
        )
    }));
    cache.flush().await;

    let smaller = WordCache::new(Arc::clone(&store), 4, Duration::from_secs(60));
    smaller.init().await;
    assert_eq!(smaller.len(), 4);
    assert!(smaller.peek("word0", "en", "zh-CN").is_none());
    assert!(smaller.peek("word1", "en", "zh-CN").is_none());
    assert!(smaller.peek("word5", "en", "zh-CN").is_some());
}

/// 并发调用 init 只加载一次
#[tokio::test]
async fn test_concurrent_init_is_single_flight() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let writer = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    seed(&writer, "technology", "en", "zh-CN", "技术", "B1");
    writer.flush().await;

    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.init().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(cache.is_initialized());
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_debounced_persist_writes_latest_snapshot() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_millis(10));
    cache.init().await;
    seed(&cache, "alpha", "en", "zh-CN", "一", "B1");
    seed(&cache, "bravo", "en", "zh-CN", "二", "B1");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let stored = store.get(&[constants::CACHE_STORAGE_KEY]).await.unwrap();
    let entries = stored[constants::CACHE_STORAGE_KEY].as_array().unwrap().len();
    assert_eq!(entries, 2);
}

#[tokio::test]
async fn test_clear_removes_persisted_key() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_secs(60));
    seed(&cache, "alpha", "en", "zh-CN", "一", "B1");
    cache.flush().await;

    cache.clear().await;
    assert!(cache.is_empty());
    assert!(store.get(&[constants::CACHE_STORAGE_KEY]).await.unwrap().is_empty());
}

/// 清空后尚未执行的防抖写入不会把空快照写回
#[tokio::test]
async fn test_clear_cancels_pending_persist() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = WordCache::new(Arc::clone(&store), 10, Duration::from_millis(20));
    cache.init().await;
    seed(&cache, "alpha", "en", "zh-CN", "一", "B1");

    cache.clear().await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(store.get(&[constants::CACHE_STORAGE_KEY]).await.unwrap().is_empty());
}

/// 持久化失败不影响内存中的缓存
#[tokio::test]
async fn test_storage_failures_are_swallowed() {
    let cache = WordCache::new(Arc::new(FailingStore::new()), 10, Duration::from_millis(5));
    cache.init().await;
    seed(&cache, "technology", "en", "zh-CN", "技术", "B1");
    cache.flush().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("technology", "en", "zh-CN").unwrap().translation, "技术");
}

#[tokio::test]
async fn test_redb_backed_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vocab.redb");

    {
        let storage = StorageAreas::open_redb(&path).unwrap();
        let cache = WordCache::new(Arc::clone(&storage.local), 10, Duration::from_millis(1));
        seed(&cache, "technology", "en", "zh-CN", "技术", "B2");
        cache.flush().await;
        // 等待防抖任务结束并释放数据库句柄
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let storage = StorageAreas::open_redb(&path).unwrap();
    let cache = WordCache::new(Arc::clone(&storage.local), 10, Duration::from_secs(60));
    cache.init().await;
    let entry = cache.get("Technology", "en", "zh-CN").unwrap();
    assert_eq!(entry.translation, "技术");
    assert_eq!(entry.difficulty, "B2");
    assert_eq!(cache.stats().cache_hits, 1);
}
