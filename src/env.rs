//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量都以 `VOCABWEAVE_` 为前缀，
//! 由 [`crate::translation::config::VocabConfig::apply_env_overrides`] 统一应用。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值
    fn get_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "VOCABWEAVE_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 功能启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "VOCABWEAVE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable inline vocabulary translations";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 母语
    pub struct NativeLanguage;
    impl EnvVar<String> for NativeLanguage {
        const NAME: &'static str = "VOCABWEAVE_NATIVE_LANGUAGE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Native language code (e.g. zh-CN, en, ja)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_language(value, Self::NAME)
        }
    }

    /// 学习语言
    pub struct LearningLanguage;
    impl EnvVar<String> for LearningLanguage {
        const NAME: &'static str = "VOCABWEAVE_LEARNING_LANGUAGE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Language being learned (e.g. en, ja, ko)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_language(value, Self::NAME)
        }
    }

    /// 用户的 CEFR 难度等级
    pub struct DifficultyLevel;
    impl EnvVar<String> for DifficultyLevel {
        const NAME: &'static str = "VOCABWEAVE_DIFFICULTY_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Minimum CEFR level of shown words: A1, A2, B1, B2, C1, C2";

        fn parse(value: &str) -> EnvResult<String> {
            let level = value.trim().to_uppercase();
            match level.as_str() {
                "A1" | "A2" | "B1" | "B2" | "C1" | "C2" => Ok(level),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid CEFR level '{}'", value),
                }),
            }
        }
    }

    /// API 地址
    pub struct ApiEndpoint;
    impl EnvVar<String> for ApiEndpoint {
        const NAME: &'static str = "VOCABWEAVE_API_ENDPOINT";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat-completion endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "VOCABWEAVE_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Bearer token for the translation API";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "VOCABWEAVE_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model name sent with chat-completion requests";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 最大并发请求数
    pub struct MaxConcurrentRequests;
    impl EnvVar<usize> for MaxConcurrentRequests {
        const NAME: &'static str = "VOCABWEAVE_MAX_CONCURRENT_REQUESTS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Maximum in-flight translation requests";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 32)
        }
    }

    /// 每段最多替换的单词数
    pub struct MaxWordsPerParagraph;
    impl EnvVar<usize> for MaxWordsPerParagraph {
        const NAME: &'static str = "VOCABWEAVE_MAX_WORDS_PER_PARAGRAPH";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Replacement budget per text segment";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 50)
        }
    }

    /// 请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "VOCABWEAVE_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "HTTP request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 单词缓存容量
    pub struct MaxSize;
    impl EnvVar<usize> for MaxSize {
        const NAME: &'static str = "VOCABWEAVE_CACHE_MAX_SIZE";
        const DEFAULT: Option<usize> = Some(5000);
        const DESCRIPTION: &'static str = "Word cache capacity (number of entries)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000)
        }
    }

    /// 持久化文件路径
    pub struct DbPath;
    impl EnvVar<String> for DbPath {
        const NAME: &'static str = "VOCABWEAVE_CACHE_DB";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the redb file backing persisted caches";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path cannot be empty".to_string(),
                });
            }
            Ok(shellexpand::tilde(path).into_owned())
        }
    }

    /// 持久化防抖间隔
    pub struct PersistDebounce;
    impl EnvVar<Duration> for PersistDebounce {
        const NAME: &'static str = "VOCABWEAVE_CACHE_PERSIST_DEBOUNCE_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(1000));
        const DESCRIPTION: &'static str = "Debounce interval for cache persistence in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_language(value: &str, var_name: &str) -> EnvResult<String> {
    let lang = value.trim();
    let base = lang.split('-').next().unwrap_or_default();
    if base.len() != 2 || !base.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language code '{}'", value),
        });
    }
    Ok(lang.to_string())
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let rows: [(&str, &str); 14] = [
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (translation::Enabled::NAME, translation::Enabled::DESCRIPTION),
        (translation::NativeLanguage::NAME, translation::NativeLanguage::DESCRIPTION),
        (translation::LearningLanguage::NAME, translation::LearningLanguage::DESCRIPTION),
        (translation::DifficultyLevel::NAME, translation::DifficultyLevel::DESCRIPTION),
        (translation::ApiEndpoint::NAME, translation::ApiEndpoint::DESCRIPTION),
        (translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION),
        (translation::Model::NAME, translation::Model::DESCRIPTION),
        (translation::MaxConcurrentRequests::NAME, translation::MaxConcurrentRequests::DESCRIPTION),
        (translation::MaxWordsPerParagraph::NAME, translation::MaxWordsPerParagraph::DESCRIPTION),
        (translation::RequestTimeout::NAME, translation::RequestTimeout::DESCRIPTION),
        (cache::MaxSize::NAME, cache::MaxSize::DESCRIPTION),
        (cache::DbPath::NAME, cache::DbPath::DESCRIPTION),
        (cache::PersistDebounce::NAME, cache::PersistDebounce::DESCRIPTION),
    ];

    for (name, description) in rows {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_parsing() {
        assert!(translation::Enabled::parse("true").unwrap());
        assert!(translation::Enabled::parse("YES").unwrap());
        assert!(!translation::Enabled::parse("off").unwrap());
        assert!(translation::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_language_validation() {
        assert_eq!(translation::NativeLanguage::parse("zh-CN").unwrap(), "zh-CN");
        assert_eq!(translation::LearningLanguage::parse(" en ").unwrap(), "en");
        assert!(translation::NativeLanguage::parse("chinese").is_err());
        assert!(translation::NativeLanguage::parse("").is_err());
    }

    #[test]
    fn test_difficulty_level_is_normalized() {
        assert_eq!(translation::DifficultyLevel::parse("b2").unwrap(), "B2");
        assert!(translation::DifficultyLevel::parse("D1").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::MaxConcurrentRequests::parse("4").unwrap(), 4);
        assert!(translation::MaxConcurrentRequests::parse("0").is_err());
        assert!(translation::MaxConcurrentRequests::parse("many").is_err());
        assert_eq!(
            cache::PersistDebounce::parse("250").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::ApiEndpoint::parse("https://api.example.com/v1/chat/completions").is_ok());
        assert!(translation::ApiEndpoint::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_docs_list_every_variable() {
        let docs = generate_env_docs();
        assert!(docs.contains("VOCABWEAVE_API_KEY"));
        assert!(docs.contains("VOCABWEAVE_CACHE_DB"));
    }
}
