//! 单词过滤器模块
//!
//! 纯函数判定：停用词、专有名词、非学习词、难度兼容性以及代码文本检测。
//! 这些都是启发式规则，允许误判。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 拉丁文字候选词的最小长度
pub const MIN_LATIN_WORD_CHARS: usize = 5;

/// CEFR 难度等级，`A1 < A2 < B1 < B2 < C1 < C2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    #[default]
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// 解析等级字符串，无法识别时返回 `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A1" => Some(CefrLevel::A1),
            "A2" => Some(CefrLevel::A2),
            "B1" => Some(CefrLevel::B1),
            "B2" => Some(CefrLevel::B2),
            "C1" => Some(CefrLevel::C1),
            "C2" => Some(CefrLevel::C2),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 英语功能词
const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each",
    "either", "else", "ever", "every", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me", "might", "more",
    "most", "must", "my", "myself", "neither", "no", "nor", "not", "now", "of", "off", "on",
    "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own",
    "same", "shall", "she", "should", "since", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "though", "through", "to", "too", "under", "until", "up", "upon", "very", "was", "we",
    "were", "what", "whatever", "when", "where", "whether", "which", "while", "who", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

/// 是否为停用词
///
/// 目前只有英语词表，其他语言一律返回 `false`。
pub fn is_stopword(word: &str, lang: &str) -> bool {
    let base = lang.split('-').next().unwrap_or_default();
    match base.to_ascii_lowercase().as_str() {
        "en" => ENGLISH_STOPWORDS.contains(&word.to_lowercase().as_str()),
        _ => false,
    }
}

/// 专有名词（或缩写）启发式判断
///
/// 全大写视为缩写，全小写不是专有名词，首字母大写的混合大小写视为专有名词。
pub fn is_proper_noun_like(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }

    let has_upper = letters.iter().any(|c| c.is_uppercase());
    let has_lower = letters.iter().any(|c| c.is_lowercase());

    if has_upper && !has_lower {
        // 单个大写字母（如 "I"）不算缩写
        return letters.len() > 1;
    }
    if !has_upper {
        return false;
    }

    letters.first().is_some_and(|c| c.is_uppercase())
}

fn domain_suffix_regex() -> Option<&'static Regex> {
    static DOMAIN_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    DOMAIN_SUFFIX
        .get_or_init(|| Regex::new(r"\.[A-Za-z]{2,}$").ok())
        .as_ref()
}

/// 是否为不适合学习的词：数字、URL、标签、路径、专有名词、域名
pub fn is_non_learning_token(word: &str) -> bool {
    if word.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }

    let lower = word.to_lowercase();
    if lower.contains("://") || lower.starts_with("www.") {
        return true;
    }

    if word.contains(['#', '@', '/', '\\']) {
        return true;
    }

    if is_proper_noun_like(word) {
        return true;
    }

    domain_suffix_regex().is_some_and(|regex| regex.is_match(word))
}

/// 单词难度是否不低于用户等级；无法解析的等级一律不兼容
pub fn is_difficulty_compatible(word_level: &str, user_level: CefrLevel) -> bool {
    match CefrLevel::parse(word_level) {
        Some(level) => level >= user_level,
        None => false,
    }
}

// 代码特征模式
const CODE_PATTERNS: &[&str] = &[
    // 关键字开头并带有代码标点的行
    r"(?m)^\s*(function|const|let|var|def|class|import|export|return|public|private|static|fn|pub|use)\b[^\n]*[=({:;]",
    r"(?m)^\s*(if|for|while|switch|catch)\s*\(",
    // 以代码符号结尾
    r"[{};]\s*$",
    r"\(\s*\)\s*$",
    // 注释标记
    r"(?m)^\s*(//|/\*|\*/|#!|<!--)",
    // 方法调用
    r"\b[A-Za-z_$][\w$]*\.[A-Za-z_$][\w$]*\(",
    // 裸 URL
    r"^\s*(https?://|www\.)\S+\s*$",
];

fn code_regexes() -> &'static [Regex] {
    static CODE_REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    CODE_REGEXES.get_or_init(|| {
        CODE_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!("代码检测正则编译失败 {}: {}", pattern, e);
                    None
                }
            })
            .collect()
    })
}

/// 文本是否看起来像代码
pub fn is_code_like(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    code_regexes().iter().any(|regex| regex.is_match(trimmed))
}

/// 是否为拉丁文字单词
pub fn is_latin_word(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_alphabetic())
}

/// 候选词是否值得学习（用于缓存命中与远程结果的统一过滤）
pub fn is_learnable(word: &str, lang: &str) -> bool {
    let trimmed = word.trim();
    if trimmed.is_empty() || is_non_learning_token(trimmed) || is_stopword(trimmed, lang) {
        return false;
    }
    if is_latin_word(trimmed) {
        return trimmed.chars().count() >= MIN_LATIN_WORD_CHARS;
    }
    trimmed.chars().count() > 1
}
