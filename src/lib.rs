//! # vocabweave
//!
//! 在网页文本中嵌入外语单词的翻译，用于沉浸式词汇学习。
//!
//! ## 模块组织
//!
//! - `parsers` - HTML 解析、DOM 操作与序列化
//! - `translation` - 分段、缓存、远程翻译与文本替换
//! - `env` - 类型安全的环境变量

pub mod env;
pub mod parsers;
pub mod translation;

pub use parsers::*;
