//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::CefrLevel;

/// 替换后的显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// 只显示译文
    #[default]
    Translation,
    /// 原文(译文)
    OriginalTranslation,
    /// 译文(原文)
    TranslationOriginal,
}

impl DisplayMode {
    /// 生成包装元素内显示的文本
    pub fn render(&self, original: &str, translation: &str) -> String {
        match self {
            DisplayMode::Translation => translation.to_string(),
            DisplayMode::OriginalTranslation => format!("{}({})", original, translation),
            DisplayMode::TranslationOriginal => format!("{}({})", translation, original),
        }
    }
}

impl FromStr for DisplayMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "translation" => Ok(DisplayMode::Translation),
            "original-translation" => Ok(DisplayMode::OriginalTranslation),
            "translation-original" => Ok(DisplayMode::TranslationOriginal),
            other => Err(TranslationError::ConfigError(format!("未知的显示模式: {}", other))),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayMode::Translation => "translation",
            DisplayMode::OriginalTranslation => "original-translation",
            DisplayMode::TranslationOriginal => "translation-original",
        };
        f.write_str(name)
    }
}

/// 词汇学习配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VocabConfig {
    // 基础配置
    pub enabled: bool,
    pub native_language: String,
    pub learning_language: String,
    pub difficulty_level: CefrLevel,
    pub max_words_per_paragraph: usize,

    // API配置
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,

    // 缓存配置
    pub cache_max_size: usize,
    pub persist_debounce_ms: u64,
    pub cache_db_path: Option<String>,

    // 分段配置
    pub min_segment_length: usize,
    pub max_segment_length: usize,
    pub viewport_margin: f64,
    pub viewport_only: bool,

    // 显示与音频
    pub display_mode: DisplayMode,
    pub audio_ack_timeout_ms: u64,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            native_language: constants::DEFAULT_NATIVE_LANGUAGE.to_string(),
            learning_language: constants::DEFAULT_LEARNING_LANGUAGE.to_string(),
            difficulty_level: CefrLevel::B1,
            max_words_per_paragraph: constants::DEFAULT_MAX_WORDS_PER_PARAGRAPH,

            api_endpoint: None,
            api_key: None,
            model: constants::DEFAULT_MODEL.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,

            cache_max_size: constants::DEFAULT_CACHE_MAX_SIZE,
            persist_debounce_ms: constants::DEFAULT_PERSIST_DEBOUNCE_MS,
            cache_db_path: None,

            min_segment_length: constants::DEFAULT_MIN_SEGMENT_LENGTH,
            max_segment_length: constants::DEFAULT_MAX_SEGMENT_LENGTH,
            viewport_margin: constants::DEFAULT_VIEWPORT_MARGIN,
            viewport_only: false,

            display_mode: DisplayMode::Translation,
            audio_ack_timeout_ms: constants::DEFAULT_AUDIO_ACK_TIMEOUT_MS,
        }
    }
}

impl VocabConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.native_language.trim().is_empty() || self.learning_language.trim().is_empty() {
            return Err(TranslationError::ConfigError("语言代码不能为空".to_string()));
        }

        if self.native_language.eq_ignore_ascii_case(&self.learning_language) {
            return Err(TranslationError::ConfigError(format!(
                "母语与学习语言不能相同: {}",
                self.native_language
            )));
        }

        if self.max_words_per_paragraph == 0 {
            return Err(TranslationError::ConfigError("每段单词数不能为0".to_string()));
        }

        if self.max_concurrent_requests == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.cache_max_size == 0 {
            return Err(TranslationError::ConfigError("缓存大小不能为0".to_string()));
        }

        if self.min_segment_length > self.max_segment_length {
            return Err(TranslationError::ConfigError(format!(
                "最小分段长度 {} 大于最大分段长度 {}",
                self.min_segment_length, self.max_segment_length
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError(format!(
                "temperature 超出范围: {}",
                self.temperature
            )));
        }

        if self.viewport_margin < 0.0 {
            return Err(TranslationError::ConfigError("视口边距不能为负数".to_string()));
        }

        if let Some(endpoint) = &self.api_endpoint {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| TranslationError::ConfigError(format!("无效的API地址 {}: {}", endpoint, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(TranslationError::ConfigError(format!(
                    "API地址必须使用 http 或 https: {}",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    /// 远程翻译所需的地址与密钥是否齐全
    pub fn has_remote_credentials(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.api_endpoint) && present(&self.api_key)
    }

    /// 应用环境变量覆盖（使用类型安全环境变量系统）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvVar};

        // 翻译相关环境变量
        if let Some(Ok(enabled)) = translation::Enabled::get_set() {
            self.enabled = enabled;
        }

        if let Some(Ok(lang)) = translation::NativeLanguage::get_set() {
            self.native_language = lang;
        }

        if let Some(Ok(lang)) = translation::LearningLanguage::get_set() {
            self.learning_language = lang;
        }

        if let Some(Ok(level)) = translation::DifficultyLevel::get_set() {
            if let Some(level) = CefrLevel::parse(&level) {
                self.difficulty_level = level;
            }
        }

        if let Some(Ok(endpoint)) = translation::ApiEndpoint::get_set() {
            tracing::info!("环境变量覆盖 API 地址: {}", endpoint);
            self.api_endpoint = Some(endpoint);
        }

        if let Some(Ok(key)) = translation::ApiKey::get_set() {
            self.api_key = Some(key);
        }

        if let Some(Ok(model)) = translation::Model::get_set() {
            self.model = model;
        }

        if let Some(Ok(max_concurrent)) = translation::MaxConcurrentRequests::get_set() {
            self.max_concurrent_requests = max_concurrent;
        }

        if let Some(Ok(max_words)) = translation::MaxWordsPerParagraph::get_set() {
            self.max_words_per_paragraph = max_words;
        }

        if let Some(Ok(timeout)) = translation::RequestTimeout::get_set() {
            self.request_timeout_secs = timeout.as_secs();
        }

        // 缓存相关环境变量
        if let Some(Ok(size)) = cache::MaxSize::get_set() {
            self.cache_max_size = size;
        }

        if let Some(Ok(path)) = cache::DbPath::get_set() {
            self.cache_db_path = Some(path);
        }

        if let Some(Ok(debounce)) = cache::PersistDebounce::get_set() {
            self.persist_debounce_ms = debounce.as_millis() as u64;
        }
    }

    /// 转换为Duration类型
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn audio_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_ack_timeout_ms)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: VocabConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器，按搜索路径查找配置文件
    pub fn new() -> TranslationResult<Self> {
        let config = Self::load_config()?;
        Self::finish(config)
    }

    /// 从指定文件创建配置管理器
    pub fn from_path(path: &str) -> TranslationResult<Self> {
        Self::load_dotenv();
        let expanded = shellexpand::tilde(path);
        tracing::info!("加载配置文件: {}", expanded);
        let config = Self::load_from_file(&expanded)?;
        Self::finish(config)
    }

    fn finish(mut config: VocabConfig) -> TranslationResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &VocabConfig {
        &self.config
    }

    pub fn into_config(self) -> VocabConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<VocabConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(VocabConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<VocabConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = VocabConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VocabConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.native_language, "zh-CN");
        assert_eq!(config.learning_language, "en");
        assert_eq!(config.difficulty_level, CefrLevel::B1);
        assert_eq!(config.max_words_per_paragraph, 3);
        assert_eq!(config.cache_max_size, 5000);
        assert!(!config.has_remote_credentials());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = VocabConfig::default();
        config.max_concurrent_requests = 0;
        assert!(config.validate().is_err());

        let mut config = VocabConfig::default();
        config.learning_language = "zh-CN".to_string();
        assert!(config.validate().is_err());

        let mut config = VocabConfig::default();
        config.api_endpoint = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: VocabConfig = toml::from_str(
            r#"
            native_language = "ja"
            difficulty_level = "C1"
            display_mode = "original-translation"
            "#,
        )
        .unwrap();

        assert_eq!(config.native_language, "ja");
        assert_eq!(config.difficulty_level, CefrLevel::C1);
        assert_eq!(config.display_mode, DisplayMode::OriginalTranslation);
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn test_display_mode_render() {
        assert_eq!(DisplayMode::Translation.render("technology", "技术"), "技术");
        assert_eq!(
            DisplayMode::OriginalTranslation.render("technology", "技术"),
            "technology(技术)"
        );
        assert_eq!(
            DisplayMode::TranslationOriginal.render("technology", "技术"),
            "技术(technology)"
        );
    }
}
