//! 词汇学习配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, DisplayMode, VocabConfig};

/// 配置常量
pub mod constants {
    // 语言设置
    pub const DEFAULT_NATIVE_LANGUAGE: &str = "zh-CN";
    pub const DEFAULT_LEARNING_LANGUAGE: &str = "en";
    pub const DEFAULT_DIFFICULTY: &str = "B1";

    // 默认API设置
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;

    // 替换预算
    pub const DEFAULT_MAX_WORDS_PER_PARAGRAPH: usize = 3;
    /// 远程请求的单词数 = 预算 × 该系数（向上取整）
    pub const REMOTE_BUDGET_FACTOR: f64 = 1.5;
    /// 缩减后的文本短于该长度时不发起远程请求
    pub const MIN_REMOTE_TEXT_LENGTH: usize = 50;

    // 缓存设置
    pub const DEFAULT_CACHE_MAX_SIZE: usize = 5000;
    pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 1000;

    // 分段设置
    pub const DEFAULT_MIN_SEGMENT_LENGTH: usize = 20;
    pub const DEFAULT_MAX_SEGMENT_LENGTH: usize = 1000;
    pub const DEFAULT_VIEWPORT_MARGIN: f64 = 500.0;
    /// 容器的直接文本必须超过该字符数
    pub const MIN_DIRECT_TEXT_LENGTH: usize = 10;
    /// 指纹只取文本的前 N 个字符
    pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

    // 音频
    pub const DEFAULT_AUDIO_ACK_TIMEOUT_MS: u64 = 3000;

    // 持久化键名
    pub const CACHE_STORAGE_KEY: &str = "vocab_translation_cache";
    pub const STATS_STORAGE_KEY: &str = "vocab_stats";
    pub const LEARNED_WORDS_KEY: &str = "learned_words";
    pub const DICTIONARY_KEY_PREFIX: &str = "dict:";

    // 替换标记
    pub const WRAPPER_TAG: &str = "span";
    pub const WRAPPER_CLASS: &str = "vocab-translated";
    pub const PROCESSED_ATTR: &str = "data-vocab-processed";

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "kbd", "samp", "var", "noscript", "template",
        "textarea", "input", "select", "option", "button", "iframe", "svg", "math", "canvas",
        "video", "audio", "object", "embed", "head", "title", "meta", "link",
    ];

    // 带有这些类名的元素不参与处理
    pub const SKIP_CLASSES: &[&str] = &[
        "notranslate", "vocab-translated", "vocab-tooltip", "highlight", "hljs", "language-",
    ];

    // 块级文本容器
    pub const BLOCK_ELEMENTS: &[&str] = &[
        "p", "div", "li", "td", "th", "dd", "dt", "blockquote", "article", "section",
        "h1", "h2", "h3", "h4", "h5", "h6", "figcaption", "caption", "summary", "main",
        "aside", "header", "footer",
    ];

    // 计入容器直接文本的行内元素
    pub const INLINE_ELEMENTS: &[&str] = &[
        "a", "em", "strong", "b", "i", "u", "span", "mark", "small", "sub", "sup", "abbr",
        "cite", "q", "s", "time", "label",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "vocabweave.toml",
        ".vocabweave.toml",
        "vocabweave.json",
        "~/.config/vocabweave/config.toml",
        "/etc/vocabweave/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
