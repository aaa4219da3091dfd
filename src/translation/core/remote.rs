//! 远程翻译客户端
//!
//! 通过聊天补全接口请求一组单词翻译。响应内容按宽松方式解析：
//! 直接数组、包装对象或从杂乱文本中提取的数组片段都可以接受，
//! 无法解析时视为没有结果。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::translation::config::{constants, VocabConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::CefrLevel;

/// 远程返回的单词记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteWord {
    pub original: String,
    pub translation: String,
    pub phonetic: String,
    pub difficulty: String,
    pub part_of_speech: String,
    pub short_definition: String,
    pub example: String,
}

impl Default for RemoteWord {
    fn default() -> Self {
        Self {
            original: String::new(),
            translation: String::new(),
            phonetic: String::new(),
            difficulty: constants::DEFAULT_DIFFICULTY.to_string(),
            part_of_speech: String::new(),
            short_definition: String::new(),
            example: String::new(),
        }
    }
}

/// 一次远程单词请求
#[derive(Debug, Clone)]
pub struct WordRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub difficulty_level: CefrLevel,
    pub min_words: usize,
    pub max_words: usize,
}

/// 远程翻译后端
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_words(&self, request: &WordRequest) -> TranslationResult<Vec<RemoteWord>>;
}

/// OpenAI 兼容的聊天补全客户端
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vocabweave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
        })
    }

    /// 从配置创建，缺少端点或密钥时返回配置错误
    pub fn from_config(config: &VocabConfig) -> TranslationResult<Self> {
        let endpoint = config
            .api_endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| TranslationError::ConfigError("未配置翻译API端点".to_string()))?;
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslationError::ConfigError("未配置翻译API密钥".to_string()))?;

        let mut client = Self::new(endpoint, api_key, &config.model, config.request_timeout())?;
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    fn request_body(&self, request: &WordRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(request) },
                { "role": "user", "content": request.text },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

fn system_prompt(request: &WordRequest) -> String {
    format!(
        "You help a language learner whose level is {level}. From the {source} text the user sends, \
         pick between {min} and {max} words or short phrases at or above that level and translate each into {target}. \
         Copy `original` exactly as it appears in the text. Reply with only a JSON array of objects with the fields \
         original, translation, phonetic, difficulty (one of A1, A2, B1, B2, C1, C2), partOfSpeech, shortDefinition, example.",
        level = request.difficulty_level,
        source = request.source_lang,
        target = request.target_lang,
        min = request.min_words,
        max = request.max_words,
    )
}

#[async_trait]
impl TranslationBackend for ChatCompletionClient {
    async fn translate_words(&self, request: &WordRequest) -> TranslationResult<Vec<RemoteWord>> {
        tracing::debug!(
            "请求远程翻译: {} -> {}, {} 字符, {}~{} 个单词",
            request.source_lang,
            request.target_lang,
            request.text.chars().count(),
            request.min_words,
            request.max_words
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::TranslationServiceError(format!(
                "翻译API返回 {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| TranslationError::ParseError("响应中缺少 choices[0].message.content".to_string()))?;

        let words = parse_word_list(content);
        tracing::debug!("远程返回 {} 个单词", words.len());
        Ok(words)
    }
}

fn array_regex() -> Option<&'static Regex> {
    static ARRAY: OnceLock<Option<Regex>> = OnceLock::new();
    ARRAY.get_or_init(|| Regex::new(r"(?s)\[.*\]").ok()).as_ref()
}

/// 宽松地解析模型输出中的单词列表
pub fn parse_word_list(content: &str) -> Vec<RemoteWord> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(words) = words_from_value(&value) {
            return words;
        }
    }

    let extracted = array_regex()
        .and_then(|regex| regex.find(trimmed))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok());
    match extracted.as_ref().and_then(words_from_value) {
        Some(words) => words,
        None => {
            tracing::warn!("无法解析远程返回的单词列表");
            Vec::new()
        }
    }
}

fn words_from_value(value: &Value) -> Option<Vec<RemoteWord>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(word_from_item).collect()),
        // 包装对象：取第一个数组字段
        Value::Object(map) => map
            .values()
            .find_map(|v| v.as_array())
            .map(|items| items.iter().filter_map(word_from_item).collect()),
        _ => None,
    }
}

fn word_from_item(item: &Value) -> Option<RemoteWord> {
    let mut word: RemoteWord = serde_json::from_value(item.clone()).ok()?;
    word.original = word.original.trim().to_string();
    word.translation = word.translation.trim().to_string();
    if word.original.is_empty() || word.translation.is_empty() {
        return None;
    }
    if word.difficulty.trim().is_empty() {
        word.difficulty = constants::DEFAULT_DIFFICULTY.to_string();
    }
    Some(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_array() {
        let words = parse_word_list(
            r#"[{"original":"changed","translation":"改变","difficulty":"A2","partOfSpeech":"verb"}]"#,
        );
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].translation, "改变");
        assert_eq!(words[0].part_of_speech, "verb");
        assert_eq!(words[0].phonetic, "");
    }

    #[test]
    fn test_parse_wrapped_object() {
        let words = parse_word_list(r#"{"words":[{"original":"lives","translation":"生活"}]}"#);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].difficulty, "B1");
    }

    #[test]
    fn test_parse_noisy_output() {
        let content = "Here you go:\n```json\n[{\"original\":\"technology\",\"translation\":\"技术\",\"difficulty\":\"\"}]\n```";
        let words = parse_word_list(content);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].original, "technology");
        assert_eq!(words[0].difficulty, "B1");
    }

    #[test]
    fn test_unparseable_is_empty() {
        assert!(parse_word_list("sorry, I cannot help with that").is_empty());
        assert!(parse_word_list(r#"[{"original":"x"}]"#).is_empty());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = VocabConfig::default();
        let err = ChatCompletionClient::from_config(&config).err().unwrap();
        assert!(matches!(err, TranslationError::ConfigError(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let mut config = VocabConfig::default();
        config.api_endpoint = Some("https://api.example.com/v1/chat/completions".to_string());
        config.api_key = Some("sk-test".to_string());
        let client = ChatCompletionClient::from_config(&config).unwrap();

        let body = client.request_body(&WordRequest {
            text: "Technology has changed our lives.".to_string(),
            source_lang: "en".to_string(),
            target_lang: "zh-CN".to_string(),
            difficulty_level: CefrLevel::B1,
            min_words: 2,
            max_words: 5,
        });
        assert_eq!(body["model"], config.model.as_str());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Technology has changed our lives.");
        assert_eq!(body["max_tokens"], 2000);
    }
}
