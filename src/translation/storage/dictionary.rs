//! 词典查询模块
//!
//! 从 Wiktionary 获取词性、释义和发音音频候选，结果缓存在本地存储区。
//! 词典只是增强信息，任何失败都返回 `None`。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kv::{load_json, save_json, KeyValueStore};
use crate::translation::config::constants;
use crate::translation::error::helpers::log_error;
use crate::translation::error::{TranslationError, TranslationResult};

pub const WIKTIONARY_BASE_URL: &str = "https://en.wiktionary.org";
pub const COMMONS_FILE_PATH: &str = "https://commons.wikimedia.org/wiki/Special:FilePath";

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// 词典条目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DictionaryEntry {
    pub word: String,
    pub phonetic: String,
    pub part_of_speech: String,
    pub short_definition: String,
    pub audio_urls: Vec<String>,
}

/// 词典后端
#[async_trait]
pub trait DictionaryBackend: Send + Sync {
    async fn fetch(&self, word: &str, lang: &str) -> TranslationResult<Option<DictionaryEntry>>;
}

fn html_tag_regex() -> Option<&'static Regex> {
    static HTML_TAG: OnceLock<Option<Regex>> = OnceLock::new();
    HTML_TAG.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// 去掉 HTML 标签并解码常见实体
pub fn strip_html(fragment: &str) -> String {
    let text = match html_tag_regex() {
        Some(regex) => regex.replace_all(fragment, "").into_owned(),
        None => fragment.to_string(),
    };
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn wiktionary_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or_default().to_lowercase()
}

/// Wikimedia Commons 上的发音文件候选
pub fn audio_candidates(word: &str, lang: &str) -> Vec<String> {
    let encoded = |name: String| {
        format!("{}/{}", COMMONS_FILE_PATH, utf8_percent_encode(&name, PATH_SEGMENT))
    };
    let word = word.trim().to_lowercase();

    match wiktionary_language(lang).as_str() {
        "en" => ["us", "uk", "au"]
            .iter()
            .map(|region| encoded(format!("En-{}-{}.ogg", region, word)))
            .collect(),
        other if !other.is_empty() => {
            let mut chars = other.chars();
            let prefix: String = chars.next().into_iter().flat_map(char::to_uppercase).chain(chars).collect();
            vec![encoded(format!("{}-{}.ogg", prefix, word))]
        }
        _ => Vec::new(),
    }
}

/// 解析 Wiktionary REST 定义接口的响应
pub fn parse_definition_response(word: &str, lang: &str, body: &Value) -> Option<DictionaryEntry> {
    let sections = body.get(wiktionary_language(lang))?.as_array()?;
    let section = sections.first()?;

    let part_of_speech = section
        .get("partOfSpeech")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let short_definition = section
        .get("definitions")
        .and_then(Value::as_array)
        .and_then(|defs| {
            defs.iter()
                .filter_map(|d| d.get("definition").and_then(Value::as_str))
                .map(strip_html)
                .find(|d| !d.is_empty())
        })
        .unwrap_or_default();

    Some(DictionaryEntry {
        word: word.to_string(),
        phonetic: String::new(),
        part_of_speech,
        short_definition,
        audio_urls: audio_candidates(word, lang),
    })
}

/// Wiktionary 客户端
pub struct WiktionaryClient {
    client: reqwest::Client,
    base_url: String,
}

impl WiktionaryClient {
    pub fn new(timeout: Duration) -> TranslationResult<Self> {
        Self::with_base_url(WIKTIONARY_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vocabweave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DictionaryBackend for WiktionaryClient {
    async fn fetch(&self, word: &str, lang: &str) -> TranslationResult<Option<DictionaryEntry>> {
        let url = format!(
            "{}/api/rest_v1/page/definition/{}",
            self.base_url,
            utf8_percent_encode(word.trim(), PATH_SEGMENT)
        );
        tracing::debug!("查询词典: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TranslationError::NetworkError(format!(
                "词典接口返回 {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        Ok(parse_definition_response(word, lang, &body))
    }
}

/// 带缓存的词典服务
pub struct DictionaryService {
    backend: Option<Arc<dyn DictionaryBackend>>,
    store: Arc<dyn KeyValueStore>,
}

impl DictionaryService {
    pub fn new(backend: Option<Arc<dyn DictionaryBackend>>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { backend, store }
    }

    fn storage_key(word: &str, lang: &str) -> String {
        format!(
            "{}{}:{}",
            constants::DICTIONARY_KEY_PREFIX,
            lang,
            word.trim().to_lowercase()
        )
    }

    /// 查询单词，优先使用缓存
    pub async fn lookup(&self, word: &str, lang: &str) -> Option<DictionaryEntry> {
        let key = Self::storage_key(word, lang);

        match load_json::<DictionaryEntry>(self.store.as_ref(), &key).await {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => log_error(&e.with_context("读取词典缓存")),
        }

        let backend = self.backend.as_ref()?;
        match backend.fetch(word, lang).await {
            Ok(Some(entry)) => {
                if let Err(e) = save_json(self.store.as_ref(), &key, &entry).await {
                    log_error(&e.with_context("写入词典缓存"));
                }
                Some(entry)
            }
            Ok(None) => {
                tracing::debug!("词典中没有找到: {}", word);
                None
            }
            Err(e) => {
                log_error(&e.with_context(format!("查询词典 {}", word)));
                None
            }
        }
    }
}
