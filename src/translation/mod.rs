//! 词汇翻译模块
//!
//! 采用分层的模块化架构：
//! - **core**: 编排服务、调度器、远程客户端、文本替换与页面会话
//! - **pipeline**: 文本处理管道（分段、语言检测、分词、过滤）
//! - **storage**: 单词缓存、键值存储、统计与词典
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use vocabweave::html::{get_body, html_to_dom};
//! use vocabweave::translation::{PageSession, StorageAreas, VocabConfig};
//! use vocabweave::translation::pipeline::{NoLayout, SegmentOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dom = html_to_dom(b"<p>Technology has changed our lives.</p>", "utf-8");
//! let storage = StorageAreas::in_memory();
//! let session = PageSession::from_config(VocabConfig::default(), &storage, true)?;
//!
//! if let Some(body) = get_body(&dom) {
//!     let report = session.process_page(&body, &NoLayout, SegmentOptions::default()).await?;
//!     println!("替换了 {} 个单词", report.total_words());
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块 - 编排、调度、替换与会话
pub mod core;

/// 错误处理模块
pub mod error;

/// 文本处理管道模块
pub mod pipeline;

/// 存储管理模块
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, DisplayMode, VocabConfig};
pub use core::{
    PageSession, PassReport, Replacement, RequestScheduler, TextReplacer, TextTranslation,
    TranslationBackend, TranslationService,
};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{CefrLevel, ContentSegmenter, LanguageDetector, TextTokenizer};
pub use storage::{CacheEntry, CacheKey, StorageAreas, WordCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 检查配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}

/// 加载配置：指定路径时只读该文件，否则按搜索路径查找
pub fn load_config(path: Option<&str>) -> TranslationResult<VocabConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

/// 打开存储区：给定数据库路径时使用 redb，否则只在内存中保存
pub fn open_storage(db_path: Option<&str>) -> TranslationResult<StorageAreas> {
    match db_path {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            if let Some(parent) = std::path::Path::new(expanded.as_ref()).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            tracing::info!("使用持久化存储: {}", expanded);
            StorageAreas::open_redb(expanded.as_ref())
        }
        None => {
            tracing::debug!("未指定存储路径，使用内存存储");
            Ok(StorageAreas::in_memory())
        }
    }
}

/// 生成示例配置文件
pub fn generate_example_config(path: &str) -> TranslationResult<()> {
    ConfigManager::generate_example_config(path)?;
    tracing::info!("已生成示例配置文件: {}", path);
    Ok(())
}
