//! 页面会话
//!
//! 把分段器、翻译服务和替换器串成一次页面处理流程，
//! 并提供标记已掌握、恢复原文、查词和发音等操作。

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use markup5ever_rcdom::Handle;

use super::audio::{play_with_fallback, AudioPlayer};
use super::engine::{remove_word, restore_all, TextReplacer};
use super::service::{Replacement, TranslationService};
use crate::translation::config::VocabConfig;
use crate::translation::error::helpers::log_error;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::segmenter::{ContentSegmenter, LayoutProvider, SegmentOptions};
use crate::translation::storage::dictionary::audio_candidates;
use crate::translation::storage::{DictionaryBackend, DictionaryEntry, DictionaryService, StorageAreas, WiktionaryClient};

/// 一次页面处理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub segments: usize,
    pub immediate_words: usize,
    pub remote_words: usize,
    pub failed_segments: usize,
}

impl PassReport {
    pub fn total_words(&self) -> usize {
        self.immediate_words + self.remote_words
    }
}

/// 页面会话
pub struct PageSession {
    service: TranslationService,
    segmenter: ContentSegmenter,
    replacer: TextReplacer,
    dictionary: DictionaryService,
    audio_timeout: Duration,
}

impl PageSession {
    pub fn new(service: TranslationService, dictionary: DictionaryService) -> Self {
        let config = service.config();
        Self {
            segmenter: ContentSegmenter::from_config(config),
            replacer: TextReplacer::from_config(config),
            audio_timeout: config.audio_ack_timeout(),
            service,
            dictionary,
        }
    }

    /// 从配置创建；`offline` 时不访问任何远程服务
    pub fn from_config(config: VocabConfig, storage: &StorageAreas, offline: bool) -> TranslationResult<Self> {
        let timeout = config.request_timeout();
        let mut service = TranslationService::new(config, storage)?;
        let dictionary_backend: Option<Arc<dyn DictionaryBackend>> = if offline {
            service = service.without_backend();
            None
        } else {
            Some(Arc::new(WiktionaryClient::new(timeout)?))
        };

        Ok(Self::new(
            service,
            DictionaryService::new(dictionary_backend, Arc::clone(&storage.local)),
        ))
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    pub fn segmenter(&self) -> &ContentSegmenter {
        &self.segmenter
    }

    /// 处理一遍页面
    ///
    /// 即时结果先应用；远程结果在调度器限制下并发等待，完成后再应用。
    /// 只有配置错误会返回，单个段落的错误记录后跳过。
    pub async fn process_page(
        &self,
        root: &Handle,
        layout: &dyn LayoutProvider,
        options: SegmentOptions,
    ) -> TranslationResult<PassReport> {
        self.service.init().await;

        let segments = self.segmenter.get_page_segments(root, options, layout);
        let mut report = PassReport {
            segments: segments.len(),
            ..Default::default()
        };
        let mut pending: Vec<(Handle, BoxFuture<'static, Vec<Replacement>>)> = Vec::new();

        for segment in &segments {
            let Some(element) = segment.element() else {
                tracing::debug!("段落元素已被释放: {}", segment.path);
                continue;
            };

            let translation = match self.service.translate_text(&segment.text).await {
                Ok(translation) => translation,
                Err(e @ TranslationError::ConfigError(_)) => return Err(e),
                Err(e) => {
                    log_error(&e.with_context(format!("处理段落 {}", segment.path)));
                    report.failed_segments += 1;
                    continue;
                }
            };

            report.immediate_words += self.replacer.apply_replacements(&element, &translation.immediate);
            if let Some(future) = translation.pending {
                pending.push((element, future));
            }
        }

        if !pending.is_empty() {
            tracing::debug!("等待 {} 个远程请求", pending.len());
            let (elements, futures): (Vec<Handle>, Vec<_>) = pending.into_iter().unzip();
            let results = join_all(futures).await;
            for (element, replacements) in elements.iter().zip(results) {
                report.remote_words += self.replacer.apply_replacements(element, &replacements);
            }
        }

        tracing::info!(
            "页面处理完成: {} 个段落，缓存 {} 个单词，远程 {} 个单词",
            report.segments,
            report.immediate_words,
            report.remote_words
        );
        Ok(report)
    }

    /// 标记单词为已掌握，并还原页面上的该单词
    pub async fn mark_learned(&self, root: &Handle, word: &str) -> usize {
        self.service.learned().init().await;
        if self.service.learned().add(word).await {
            tracing::info!("已掌握: {}", word);
        }
        remove_word(root, word)
    }

    /// 恢复原文并允许重新分段
    pub fn restore_original(&self, root: &Handle) -> usize {
        let restored = restore_all(root);
        self.segmenter.reset();
        restored
    }

    /// 查词
    pub async fn lookup_word(&self, word: &str, lang: &str) -> Option<DictionaryEntry> {
        self.dictionary.lookup(word, lang).await
    }

    /// 播放单词发音，词典没有音频时使用默认候选地址
    pub async fn play_pronunciation(&self, word: &str, lang: &str, player: &dyn AudioPlayer) -> bool {
        let urls = match self.lookup_word(word, lang).await {
            Some(entry) if !entry.audio_urls.is_empty() => entry.audio_urls,
            _ => audio_candidates(word, lang),
        };
        play_with_fallback(player, &urls, self.audio_timeout).await
    }

    /// 立即持久化缓存
    pub async fn flush(&self) {
        self.service.cache().flush().await;
    }
}
