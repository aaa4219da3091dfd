//! 存储模块
//!
//! 提供单词缓存、键值持久化、学习统计和词典缓存。

pub mod cache;
pub mod dictionary;
pub mod kv;
pub mod stats;

pub use cache::{CacheEntry, CacheKey, CacheStats, WordCache};
pub use dictionary::{DictionaryBackend, DictionaryEntry, DictionaryService, WiktionaryClient};
pub use kv::{KeyValueStore, MemoryStore, RedbStore, StorageAreas, StorageChange};
pub use stats::{LearnedWords, StatsRecorder, UsageStats};
