//! 文本分词模块
//!
//! 拉丁文字按空白切分；中文使用 jieba 词典分词（`cjk-dictionary` 特性），
//! 不可用时退回到连续汉字串；日文、韩文提取对应区块的连续字符串。

use std::sync::OnceLock;

use regex::Regex;

use super::filters::{is_stopword, MIN_LATIN_WORD_CHARS};
use super::language::{is_cjk_language, is_ideograph};

const IDEOGRAPH_RUN: &str = r"[\x{4E00}-\x{9FFF}\x{3400}-\x{4DBF}\x{F900}-\x{FAFF}]+";
const JAPANESE_RUN: &str = r"[\x{3040}-\x{30FF}\x{4E00}-\x{9FFF}]+";
const HANGUL_RUN: &str = r"[\x{AC00}-\x{D7AF}\x{1100}-\x{11FF}\x{3130}-\x{318F}]+";

/// 正则表达式缓存
struct RegexCache {
    ideograph_run: OnceLock<Option<Regex>>,
    japanese_run: OnceLock<Option<Regex>>,
    hangul_run: OnceLock<Option<Regex>>,
}

static REGEX_CACHE: RegexCache = RegexCache {
    ideograph_run: OnceLock::new(),
    japanese_run: OnceLock::new(),
    hangul_run: OnceLock::new(),
};

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("分词正则编译失败: {}", e);
            None
        }
    })
    .as_ref()
}

fn extract_runs(text: &str, regex: Option<&Regex>) -> Vec<String> {
    regex
        .map(|regex| regex.find_iter(text).map(|m| m.as_str().to_string()).collect())
        .unwrap_or_default()
}

#[cfg(feature = "cjk-dictionary")]
fn jieba() -> &'static jieba_rs::Jieba {
    static JIEBA: OnceLock<jieba_rs::Jieba> = OnceLock::new();
    JIEBA.get_or_init(|| {
        tracing::debug!("加载中文分词词典");
        jieba_rs::Jieba::new()
    })
}

/// 文本分词器
#[derive(Debug, Clone, Copy)]
pub struct TextTokenizer {
    use_dictionary: bool,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            use_dictionary: cfg!(feature = "cjk-dictionary"),
        }
    }

    /// 不使用词典，中文一律按连续汉字串切分
    pub fn without_dictionary() -> Self {
        Self { use_dictionary: false }
    }

    /// 将文本切分为候选词
    pub fn segment(&self, text: &str, language: &str) -> Vec<String> {
        if is_cjk_language(language) {
            return self.segment_chinese(text);
        }

        match language.split('-').next().unwrap_or_default() {
            "ja" => extract_runs(text, cached(&REGEX_CACHE.japanese_run, JAPANESE_RUN)),
            "ko" => extract_runs(text, cached(&REGEX_CACHE.hangul_run, HANGUL_RUN)),
            _ => segment_latin(text),
        }
    }

    fn segment_chinese(&self, text: &str) -> Vec<String> {
        if self.use_dictionary {
            if let Some(tokens) = Self::segment_with_dictionary(text) {
                return tokens;
            }
            tracing::debug!("词典分词不可用，退回到汉字串提取");
        }
        extract_runs(text, cached(&REGEX_CACHE.ideograph_run, IDEOGRAPH_RUN))
    }

    #[cfg(feature = "cjk-dictionary")]
    fn segment_with_dictionary(text: &str) -> Option<Vec<String>> {
        let tokens: Vec<String> = jieba()
            .cut(text, true)
            .into_iter()
            .filter(|token| token.chars().any(is_ideograph))
            .map(str::to_string)
            .collect();

        if tokens.is_empty() && text.chars().any(is_ideograph) {
            None
        } else {
            Some(tokens)
        }
    }

    #[cfg(not(feature = "cjk-dictionary"))]
    fn segment_with_dictionary(_text: &str) -> Option<Vec<String>> {
        None
    }

    /// 过滤候选词：拉丁文字去掉停用词和短词，中文去掉单字
    pub fn filter_words(&self, tokens: Vec<String>, language: &str) -> Vec<String> {
        if is_cjk_language(language) {
            return tokens
                .into_iter()
                .filter(|token| !(token.chars().count() == 1 && token.chars().all(is_ideograph)))
                .collect();
        }

        match language.split('-').next().unwrap_or_default() {
            "ja" | "ko" => tokens,
            _ => tokens
                .into_iter()
                .filter(|token| {
                    token.chars().count() >= MIN_LATIN_WORD_CHARS && !is_stopword(token, language)
                })
                .collect(),
        }
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_strippable(c: char) -> bool {
    if matches!(c, '#' | '@' | '/' | '\\') {
        return false;
    }
    c.is_ascii_punctuation()
        || matches!(
            c,
            '“' | '”' | '‘' | '’' | '«' | '»' | '…' | '—' | '–' | '¿' | '¡' | '„' | '·'
        )
}

fn segment_latin(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| raw.trim_matches(is_strippable))
        .filter(|token| token.chars().any(|c| c.is_alphabetic()))
        .map(str::to_string)
        .collect()
}
