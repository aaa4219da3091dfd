//! 错误处理集成测试
//!
//! 配置错误向上传播，存储和网络错误在组件边界降级

use std::sync::Arc;
use std::time::Duration;

use vocabweave::translation::core::{ChatCompletionClient, PageSession, TranslationBackend};
use vocabweave::translation::pipeline::{NoLayout, SegmentOptions};
use vocabweave::translation::storage::{DictionaryService, KeyValueStore, LearnedWords, StatsRecorder};
use vocabweave::translation::{ErrorCategory, StorageAreas, TranslationError, VocabConfig};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{body_of, build_service, parse_html, seed, test_config, FailingStore};

const TEXT: &str = "Researchers discovered remarkable evidence supporting the hypothesis yesterday.";

fn failing_storage() -> StorageAreas {
    let store: Arc<dyn KeyValueStore> = Arc::new(FailingStore::new());
    StorageAreas::new(Arc::clone(&store), store)
}

#[tokio::test]
async fn test_endpoint_without_key_is_config_error() {
    let config = VocabConfig {
        api_endpoint: Some("https://api.example.com/v1/chat/completions".to_string()),
        ..test_config()
    };
    let storage = StorageAreas::in_memory();
    let service = build_service(config, &storage, None);

    let err = service.translate_text(TEXT).await.unwrap_err();
    assert!(matches!(err, TranslationError::ConfigError(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_page_pass_propagates_config_error() {
    let config = VocabConfig {
        api_key: Some("sk-test".to_string()),
        ..test_config()
    };
    let storage = StorageAreas::in_memory();
    let service = build_service(config, &storage, None);
    let session = PageSession::new(service, DictionaryService::new(None, Arc::clone(&storage.local)));

    let dom = parse_html(&format!("<html><body><p>{}</p></body></html>", TEXT));
    let err = session
        .process_page(&body_of(&dom), &NoLayout, SegmentOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let config = VocabConfig {
        native_language: "en".to_string(),
        learning_language: "EN".to_string(),
        ..test_config()
    };
    let result = vocabweave::translation::TranslationService::new(config, &StorageAreas::in_memory());
    assert!(matches!(result, Err(TranslationError::ConfigError(_))));
}

/// 存储全部失败时服务仍然可用
#[tokio::test]
async fn test_failing_storage_degrades_to_memory() {
    let storage = failing_storage();
    let service = build_service(test_config(), &storage, None);
    service.init().await;
    seed(service.cache(), "evidence", "en", "zh-CN", "证据", "B1");

    let result = service.translate_text(TEXT).await.unwrap();
    assert_eq!(result.immediate.len(), 1);
    assert_eq!(result.immediate[0].translation, "证据");

    service.cache().flush().await;
    assert_eq!(service.stats().session_totals().cache_hits, 1);
}

#[tokio::test]
async fn test_stats_and_learned_words_survive_storage_failures() {
    let store: Arc<dyn KeyValueStore> = Arc::new(FailingStore::new());

    let stats = StatsRecorder::new(Arc::clone(&store));
    stats.record_remote_round_trip(4);
    assert_eq!(stats.load().await.cache_misses, 0);
    assert_eq!(stats.session_totals().new_words_learned, 4);

    let learned = LearnedWords::new(store);
    learned.init().await;
    assert!(learned.add("Hypothesis").await);
    assert!(learned.contains("hypothesis"));
}

/// 远程接口不可达时待定结果为空
#[tokio::test]
async fn test_unreachable_endpoint_yields_empty_pending() {
    let client = ChatCompletionClient::new(
        "http://127.0.0.1:9/v1/chat/completions",
        "sk-test",
        "test-model",
        Duration::from_secs(2),
    )
    .unwrap();
    let storage = StorageAreas::in_memory();
    let service = build_service(test_config(), &storage, Some(Arc::new(client) as Arc<dyn TranslationBackend>));

    let result = service.translate_text(TEXT).await.unwrap();
    let pending = result.pending.expect("remote request expected");
    assert!(pending.await.is_empty());
    assert_eq!(service.stats().session_totals().cache_misses, 0);
    assert_eq!(service.scheduler().active(), 0);
}

#[test]
fn test_context_is_appended_to_message() {
    let err = TranslationError::StorageError("quota exceeded".to_string()).with_context("写入缓存");
    assert!(err.to_string().contains("quota exceeded"));
    assert!(err.to_string().contains("写入缓存"));
    assert!(!err.is_fatal());
}
