//! 翻译编排服务
//!
//! 对一段文本给出两部分结果：
//!
//! - **即时结果**: 来自单词缓存，按难度过滤后立即返回
//! - **待定结果**: 未缓存的单词通过调度器发往远程接口，完成后合并入缓存
//!
//! 每段替换的单词数受 `max_words_per_paragraph` 限制。远程失败只记录日志，
//! 即时结果不受影响；只有配置错误会返回给调用者。

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::engine::find_match;
use super::remote::{ChatCompletionClient, RemoteWord, TranslationBackend, WordRequest};
use super::scheduler::RequestScheduler;
use crate::translation::config::{constants, VocabConfig};
use crate::translation::error::helpers::log_error;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::{is_difficulty_compatible, is_learnable, is_non_learning_token};
use crate::translation::pipeline::language::{is_cjk_language, LanguageDetector};
use crate::translation::pipeline::tokenizer::TextTokenizer;
use crate::translation::storage::{CacheEntry, CacheKey, LearnedWords, StatsRecorder, StorageAreas, WordCache};

/// 一次替换
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub original: String,
    pub translation: String,
    pub phonetic: String,
    pub difficulty: String,
    pub part_of_speech: String,
    pub short_definition: String,
    pub example: String,
    /// 在段落文本中首次出现的字符偏移
    pub position: usize,
    pub source_lang: String,
}

impl Replacement {
    fn from_cache(word: &str, entry: &CacheEntry, position: usize, source_lang: &str) -> Self {
        Self {
            original: word.to_string(),
            translation: entry.translation.clone(),
            phonetic: entry.phonetic.clone(),
            difficulty: entry.difficulty.clone(),
            part_of_speech: entry.part_of_speech.clone(),
            short_definition: entry.short_definition.clone(),
            example: entry.example.clone(),
            position,
            source_lang: source_lang.to_string(),
        }
    }

    fn from_remote(word: &RemoteWord, position: usize, source_lang: &str) -> Self {
        Self {
            original: word.original.clone(),
            translation: word.translation.clone(),
            phonetic: word.phonetic.clone(),
            difficulty: word.difficulty.clone(),
            part_of_speech: word.part_of_speech.clone(),
            short_definition: word.short_definition.clone(),
            example: word.example.clone(),
            position,
            source_lang: source_lang.to_string(),
        }
    }
}

fn entry_from_remote(word: &RemoteWord) -> CacheEntry {
    CacheEntry {
        phonetic: word.phonetic.clone(),
        part_of_speech: word.part_of_speech.clone(),
        short_definition: word.short_definition.clone(),
        example: word.example.clone(),
        ..CacheEntry::new(&word.translation, &word.difficulty)
    }
}

/// 一段文本的翻译结果
pub struct TextTranslation {
    pub source_lang: String,
    pub target_lang: String,
    pub immediate: Vec<Replacement>,
    pub pending: Option<BoxFuture<'static, Vec<Replacement>>>,
}

impl TextTranslation {
    fn empty(source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            immediate: Vec::new(),
            pending: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl std::fmt::Debug for TextTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTranslation")
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .field("immediate", &self.immediate)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// 翻译编排服务
pub struct TranslationService {
    config: VocabConfig,
    detector: LanguageDetector,
    tokenizer: TextTokenizer,
    cache: WordCache,
    scheduler: RequestScheduler,
    backend: Option<Arc<dyn TranslationBackend>>,
    stats: StatsRecorder,
    learned: Arc<LearnedWords>,
}

impl TranslationService {
    /// 根据配置和存储区创建服务
    ///
    /// 地址与密钥都存在时创建远程客户端，否则只使用缓存。
    pub fn new(config: VocabConfig, storage: &StorageAreas) -> TranslationResult<Self> {
        config.validate()?;

        let backend: Option<Arc<dyn TranslationBackend>> = if config.has_remote_credentials() {
            Some(Arc::new(ChatCompletionClient::from_config(&config)?))
        } else {
            tracing::info!("未配置远程翻译，仅使用本地缓存");
            None
        };

        Ok(Self {
            detector: LanguageDetector::new(),
            tokenizer: TextTokenizer::new(),
            cache: WordCache::from_config(Arc::clone(&storage.local), &config),
            scheduler: RequestScheduler::from_config(&config),
            backend,
            stats: StatsRecorder::new(Arc::clone(&storage.sync)),
            learned: Arc::new(LearnedWords::new(Arc::clone(&storage.sync))),
            config,
        })
    }

    pub fn with_backend(mut self, backend: Arc<dyn TranslationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn without_backend(mut self) -> Self {
        self.backend = None;
        self
    }

    pub fn with_detector(mut self, detector: LanguageDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TextTokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// 加载缓存和已掌握单词
    pub async fn init(&self) {
        self.cache.init().await;
        self.learned.init().await;
    }

    pub fn config(&self) -> &VocabConfig {
        &self.config
    }

    pub fn cache(&self) -> &WordCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn learned(&self) -> &LearnedWords {
        &self.learned
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// 只填写了地址或密钥之一视为配置错误
    fn check_config(&self) -> TranslationResult<()> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        let endpoint = present(&self.config.api_endpoint);
        let key = present(&self.config.api_key);
        match (endpoint, key) {
            (true, false) => Err(TranslationError::ConfigError("已配置API地址但缺少API密钥".to_string())),
            (false, true) => Err(TranslationError::ConfigError("已配置API密钥但缺少API地址".to_string())),
            _ => Ok(()),
        }
    }

    /// 源语言对应的目标语言
    pub fn target_language_for(&self, source_lang: &str) -> String {
        if same_language(source_lang, &self.config.native_language) {
            self.config.learning_language.clone()
        } else {
            self.config.native_language.clone()
        }
    }

    /// 翻译一段文本
    pub async fn translate_text(&self, text: &str) -> TranslationResult<TextTranslation> {
        self.check_config()?;

        let source_lang = self.detector.detect(text);
        let target_lang = self.target_language_for(&source_lang);
        if !self.config.enabled || text.trim().is_empty() {
            return Ok(TextTranslation::empty(&source_lang, &target_lang));
        }

        let budget = self.config.max_words_per_paragraph;
        let candidates = self.candidate_words(text, &source_lang);

        // 按缓存划分
        let mut hits: Vec<(String, CacheEntry)> = Vec::new();
        let mut uncached: Vec<String> = Vec::new();
        for word in candidates {
            match self.cache.get(&word, &source_lang, &target_lang) {
                Some(entry) => hits.push((word, entry)),
                None => uncached.push(word),
            }
        }
        if is_cjk_script(&source_lang) {
            self.scan_cached_phrases(text, &source_lang, &target_lang, &mut hits);
        }

        let compatible: Vec<Replacement> = hits
            .iter()
            .filter(|(_, entry)| is_difficulty_compatible(&entry.difficulty, self.config.difficulty_level))
            .filter_map(|(word, entry)| {
                find_position(text, word).map(|position| Replacement::from_cache(word, entry, position, &source_lang))
            })
            .collect();

        let split = compatible.len().min(budget);
        let mut immediate = compatible;
        let unconsumed = immediate.split_off(split);

        if !immediate.is_empty() {
            self.stats.record_cache_hit();
        }
        tracing::debug!(
            "段落 {} -> {}: 缓存命中 {}，未缓存 {}",
            source_lang,
            target_lang,
            immediate.len(),
            uncached.len()
        );

        let remaining = budget.saturating_sub(immediate.len());
        let mut result = TextTranslation {
            source_lang: source_lang.clone(),
            target_lang: target_lang.clone(),
            immediate,
            pending: None,
        };

        if uncached.is_empty() || remaining == 0 {
            return Ok(result);
        }
        let Some(backend) = self.backend.clone() else {
            return Ok(result);
        };

        let reduced = reduce_text(text, &uncached);
        if reduced.chars().count() < constants::MIN_REMOTE_TEXT_LENGTH {
            tracing::debug!("剩余文本过短，跳过远程请求");
            return Ok(result);
        }

        let request = WordRequest {
            text: reduced,
            source_lang,
            target_lang,
            difficulty_level: self.config.difficulty_level,
            min_words: remaining,
            max_words: remote_word_limit(budget),
        };
        let merge = RemoteMerge {
            original_text: text.to_string(),
            sentence_starts: self.sentence_starts(text, &request.source_lang),
            cache: self.cache.clone(),
            stats: self.stats.clone(),
            learned: Arc::clone(&self.learned),
            already_shown: result.immediate.iter().map(|r| r.original.to_lowercase()).collect(),
            unconsumed,
            remaining,
        };
        let scheduler = self.scheduler.clone();

        result.pending = Some(
            async move {
                let outcome = scheduler
                    .run_limited(backend.translate_words(&request))
                    .await
                    .and_then(|inner| inner);
                match outcome {
                    Ok(words) => merge.apply(&request, words),
                    Err(e) => {
                        log_error(&e.with_context("远程翻译"));
                        Vec::new()
                    }
                }
            }
            .boxed(),
        );

        Ok(result)
    }

    /// 分词、过滤、转小写去重，并排除已掌握的单词
    ///
    /// 专有名词判断使用原文大小写，转小写在其之后。
    fn candidate_words(&self, text: &str, source_lang: &str) -> Vec<String> {
        let tokens = self.tokenizer.segment(text, source_lang);
        let starts = self.sentence_starts(text, source_lang);
        let mut seen = HashSet::new();
        self.tokenizer
            .filter_words(tokens, source_lang)
            .into_iter()
            .filter(|token| !is_non_learning_in_context(token, &starts))
            .map(|token| token.to_lowercase())
            .filter(|word| is_learnable(word, source_lang))
            .filter(|word| !self.learned.contains(word))
            .filter(|word| seen.insert(word.clone()))
            .collect()
    }

    /// 每个句子的第一个词
    fn sentence_starts(&self, text: &str, source_lang: &str) -> HashSet<String> {
        split_sentences(text)
            .into_iter()
            .filter_map(|sentence| self.tokenizer.segment(sentence, source_lang).into_iter().next())
            .collect()
    }

    /// 在原文中查找分词没有切出的已缓存短语
    fn scan_cached_phrases(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        hits: &mut Vec<(String, CacheEntry)>,
    ) {
        let mut known: HashSet<String> = hits.iter().map(|(word, _)| word.clone()).collect();
        for word in self.cache.cached_words(source_lang, target_lang) {
            if known.contains(&word) || self.learned.contains(&word) || !text.contains(word.as_str()) {
                continue;
            }
            if let Some(entry) = self.cache.get(&word, source_lang, target_lang) {
                tracing::trace!("子串匹配到缓存短语: {}", word);
                known.insert(word.clone());
                hits.push((word, entry));
            }
        }
    }
}

/// 远程结果合并所需的上下文
struct RemoteMerge {
    original_text: String,
    sentence_starts: HashSet<String>,
    cache: WordCache,
    stats: StatsRecorder,
    learned: Arc<LearnedWords>,
    already_shown: HashSet<String>,
    unconsumed: Vec<Replacement>,
    remaining: usize,
}

impl RemoteMerge {
    fn apply(self, request: &WordRequest, words: Vec<RemoteWord>) -> Vec<Replacement> {
        let source_lang = request.source_lang.as_str();
        let accepted: Vec<RemoteWord> = words
            .into_iter()
            .filter(|word| {
                let lower = word.original.to_lowercase();
                !is_non_learning_in_context(&word.original, &self.sentence_starts)
                    && is_learnable(&lower, source_lang)
                    && !self.learned.contains(&lower)
            })
            .collect();

        self.cache.set_many(accepted.iter().map(|word| {
            (
                CacheKey::new(&word.original, source_lang, &request.target_lang),
                entry_from_remote(word),
            )
        }));
        self.stats.record_remote_round_trip(accepted.len() as u64);

        let mut seen = self.already_shown;
        let mut merged = Vec::new();
        let relocated = accepted.iter().filter_map(|word| {
            find_position(&self.original_text, &word.original)
                .map(|position| Replacement::from_remote(word, position, source_lang))
        });
        for replacement in relocated.chain(self.unconsumed) {
            if seen.insert(replacement.original.to_lowercase()) {
                merged.push(replacement);
            }
        }
        merged.truncate(self.remaining);

        tracing::debug!("远程结果合并后 {} 个替换", merged.len());
        merged
    }
}

/// 按原文大小写判断非学习词
///
/// 句首单词只有首字母大写时按小写判断，全大写的缩写仍被排除。
fn is_non_learning_in_context(token: &str, sentence_starts: &HashSet<String>) -> bool {
    let capitalized_only = token.chars().skip(1).all(|c| !c.is_uppercase());
    if capitalized_only && sentence_starts.contains(token) {
        is_non_learning_token(&token.to_lowercase())
    } else {
        is_non_learning_token(token)
    }
}

fn primary_subtag(lang: &str) -> String {
    lang.split('-').next().unwrap_or_default().to_ascii_lowercase()
}

fn same_language(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || primary_subtag(a) == primary_subtag(b)
}

fn is_cjk_script(lang: &str) -> bool {
    is_cjk_language(lang) || matches!(primary_subtag(lang).as_str(), "ja" | "ko")
}

/// 远程请求的单词上限：预算的 1.5 倍向上取整
pub fn remote_word_limit(budget: usize) -> usize {
    (budget as f64 * constants::REMOTE_BUDGET_FACTOR).ceil() as usize
}

/// 单词在原文中的字符偏移（不区分大小写），与替换时的匹配规则一致
pub fn find_position(text: &str, word: &str) -> Option<usize> {
    find_match(text, word).map(|(start, _)| text[..start].chars().count())
}

/// 按句子切分，保留句末标点
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '\n') {
            let is_last_terminator = chars
                .peek()
                .map_or(true, |&(_, next)| !matches!(next, '.' | '!' | '?' | '。' | '！' | '？'));
            if is_last_terminator {
                let end = index + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// 只保留包含未缓存单词的句子
pub fn reduce_text(text: &str, uncached: &[String]) -> String {
    split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            uncached.iter().any(|word| lower.contains(word.as_str()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_position_is_char_offset() {
        assert_eq!(find_position("Technology has changed our lives.", "technology"), Some(0));
        assert_eq!(find_position("我们的技术改变了生活", "技术"), Some(3));
        assert_eq!(find_position("nothing here", "absent"), None);
    }

    #[test]
    fn test_find_position_ignores_lowercase_expansion() {
        // "İ" 转小写后变成两个字符，偏移仍按原文计算
        assert_eq!(find_position("İstanbul technology", "technology"), Some(9));
        assert_eq!(find_position("İİİ Technology", "technology"), Some(4));
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("First one. Second one?! 第三句。tail"),
            vec!["First one.", "Second one?!", "第三句。", "tail"]
        );
    }

    #[test]
    fn test_reduce_text_keeps_relevant_sentences() {
        let text = "Cats sleep a lot. Quantum entanglement puzzles physicists. Dogs bark.";
        let reduced = reduce_text(text, &["entanglement".to_string()]);
        assert_eq!(reduced, "Quantum entanglement puzzles physicists.");
    }

    #[test]
    fn test_sentence_initial_capital_is_not_proper_noun() {
        let starts: HashSet<String> = ["Technology".to_string(), "NASA".to_string()].into();
        assert!(!is_non_learning_in_context("Technology", &starts));
        assert!(is_non_learning_in_context("NASA", &starts));
        assert!(is_non_learning_in_context("Microsoft", &starts));
        assert!(!is_non_learning_in_context("released", &starts));
    }

    #[test]
    fn test_remote_word_limit() {
        assert_eq!(remote_word_limit(3), 5);
        assert_eq!(remote_word_limit(4), 6);
    }

    #[test]
    fn test_same_language() {
        assert!(same_language("zh-CN", "zh"));
        assert!(same_language("EN", "en"));
        assert!(!same_language("ja", "zh-CN"));
    }

    #[tokio::test]
    async fn test_target_language_switches_direction() {
        let service = TranslationService::new(VocabConfig::default(), &StorageAreas::in_memory()).unwrap();
        assert_eq!(service.target_language_for("en"), "zh-CN");
        assert_eq!(service.target_language_for("zh-CN"), "en");
    }

    #[tokio::test]
    async fn test_incomplete_credentials_fail_fast() {
        let config = VocabConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let service = TranslationService::new(config, &StorageAreas::in_memory()).unwrap();
        let err = service.translate_text("Technology has changed our lives.").await.unwrap_err();
        assert!(matches!(err, TranslationError::ConfigError(_)));
    }
}
