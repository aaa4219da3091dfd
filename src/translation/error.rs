//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 传播策略：只有配置错误会传递到顶层调用者，其余可恢复的错误
//! （网络、解析、持久化、DOM竞争）都在检测到它们的组件边界被记录并吸收。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 持久化存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 翻译服务错误
    #[error("翻译服务错误: {0}")]
    TranslationServiceError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// DOM 在扫描与替换之间发生了变化
    #[error("DOM错误: {0}")]
    DomError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Warning,
            TranslationError::TranslationServiceError(_) => ErrorSeverity::Error,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Warning,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ConcurrencyError(_) => ErrorSeverity::Warning,
            TranslationError::DomError(_) => ErrorSeverity::Info,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::TranslationServiceError(_) => ErrorCategory::Service,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ConcurrencyError(_) => ErrorCategory::Concurrency,
            TranslationError::DomError(_) => ErrorCategory::Dom,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 是否应该传播到顶层调用者
    ///
    /// 只有配置类错误需要让调用者知道，其余错误在组件边界降级处理。
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let current_msg = self.to_string();
        let new_msg = format!("{} (上下文: {})", current_msg, context);

        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::NetworkError(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::CacheError(ref mut msg)
            | TranslationError::StorageError(ref mut msg)
            | TranslationError::TranslationServiceError(ref mut msg)
            | TranslationError::TimeoutError(ref mut msg)
            | TranslationError::ParseError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::ConcurrencyError(ref mut msg)
            | TranslationError::DomError(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => *msg = new_msg,
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Input,
    Cache,
    Storage,
    Service,
    Timeout,
    Parsing,
    Serialization,
    Concurrency,
    Dom,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("HTTP请求超时: {}", error))
        } else if error.is_decode() {
            TranslationError::ParseError(format!("响应解码失败: {}", error))
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<redb::Error> for TranslationError {
    fn from(error: redb::Error) -> Self {
        TranslationError::StorageError(format!("redb: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<tokio::sync::AcquireError> for TranslationError {
    fn from(error: tokio::sync::AcquireError) -> Self {
        TranslationError::ConcurrencyError(format!("获取并发许可失败: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录一个被吸收的错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::debug!("已忽略: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 记录错误并返回默认值，用于降级路径
    pub fn absorb<T: Default>(result: TranslationResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => {
                log_error(&error);
                T::default()
            }
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建存储错误
    pub fn storage_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StorageError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(TranslationError::ConfigError("缺少API密钥".into()).is_fatal());
        assert!(!TranslationError::NetworkError("502".into()).is_fatal());
        assert!(!TranslationError::ParseError("not json".into()).is_fatal());
        assert!(!TranslationError::StorageError("quota".into()).is_fatal());
        assert!(!TranslationError::DomError("node detached".into()).is_fatal());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let err = TranslationError::NetworkError("reset".into()).with_context("segment 3");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.to_string().contains("segment 3"));
    }

    #[test]
    fn test_absorb_returns_default() {
        let value: Vec<u8> = helpers::absorb(Err(TranslationError::ParseError("bad".into())));
        assert!(value.is_empty());
        assert_eq!(helpers::absorb(Ok(7u32)), 7);
    }
}
