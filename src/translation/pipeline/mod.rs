//! 文本处理管道模块
//!
//! 提供页面文本的分段、语言检测、分词和单词过滤

pub mod filters;
pub mod language;
pub mod segmenter;
pub mod tokenizer;

// 重新导出主要类型
pub use filters::{
    is_code_like, is_difficulty_compatible, is_non_learning_token, is_proper_noun_like,
    is_stopword, CefrLevel,
};
pub use language::{LanguageCode, LanguageDetector};
pub use segmenter::{
    ContentSegmenter, LayoutProvider, NoLayout, Rect, Segment, SegmentOptions, Viewport,
};
pub use tokenizer::TextTokenizer;
