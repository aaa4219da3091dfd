// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};
use serde_json::Value;
use tokio::sync::broadcast;

use vocabweave::html::{find_nodes, get_body, html_to_dom};
use vocabweave::translation::core::{RemoteWord, TranslationBackend, WordRequest};
use vocabweave::translation::pipeline::LanguageDetector;
use vocabweave::translation::storage::{CacheEntry, KeyValueStore, StorageChange};
use vocabweave::translation::{
    StorageAreas, TranslationError, TranslationResult, TranslationService, VocabConfig, WordCache,
};

/// 解析 HTML 文档
pub fn parse_html(html: &str) -> RcDom {
    html_to_dom(html.as_bytes(), "utf-8")
}

/// 文档的 body
pub fn body_of(dom: &RcDom) -> Handle {
    get_body(dom).expect("document should have a body")
}

/// body 下第 `index` 个指定标签
pub fn nth_tag(dom: &RcDom, tag: &str, index: usize) -> Handle {
    find_nodes(&dom.document, &["html", "body", tag])
        .into_iter()
        .nth(index)
        .expect("tag should exist")
}

/// 测试用配置：只使用缓存、持久化防抖很短
pub fn test_config() -> VocabConfig {
    VocabConfig {
        persist_debounce_ms: 10,
        min_segment_length: 10,
        ..Default::default()
    }
}

/// 构建使用文字计数检测语言的服务
pub fn build_service(
    config: VocabConfig,
    storage: &StorageAreas,
    backend: Option<Arc<dyn TranslationBackend>>,
) -> TranslationService {
    let service = TranslationService::new(config, storage)
        .expect("config should be valid")
        .with_detector(LanguageDetector::script_only());
    match backend {
        Some(backend) => service.with_backend(backend),
        None => service.without_backend(),
    }
}

/// 向缓存写入一条翻译
pub fn seed(cache: &WordCache, word: &str, source: &str, target: &str, translation: &str, difficulty: &str) {
    cache.set(word, source, target, CacheEntry::new(translation, difficulty));
}

pub fn remote_word(original: &str, translation: &str, difficulty: &str) -> RemoteWord {
    RemoteWord {
        original: original.to_string(),
        translation: translation.to_string(),
        difficulty: difficulty.to_string(),
        ..Default::default()
    }
}

/// 按脚本返回结果的远程后端
pub struct MockBackend {
    words: Vec<RemoteWord>,
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<WordRequest>>,
}

impl MockBackend {
    pub fn returning(words: Vec<RemoteWord>) -> Arc<Self> {
        Arc::new(Self {
            words,
            fail: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            words: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<WordRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate_words(&self, request: &WordRequest) -> TranslationResult<Vec<RemoteWord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(TranslationError::NetworkError("connection refused".to_string()));
        }
        Ok(self.words.clone())
    }
}

/// 所有操作都失败的存储
pub struct FailingStore {
    sender: broadcast::Sender<StorageChange>,
}

impl FailingStore {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(4);
        Self { sender }
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _keys: &[&str]) -> TranslationResult<HashMap<String, Value>> {
        Err(TranslationError::StorageError("quota exceeded".to_string()))
    }

    async fn set(&self, _items: HashMap<String, Value>) -> TranslationResult<()> {
        Err(TranslationError::StorageError("quota exceeded".to_string()))
    }

    async fn remove(&self, _keys: &[&str]) -> TranslationResult<()> {
        Err(TranslationError::StorageError("quota exceeded".to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }
}
