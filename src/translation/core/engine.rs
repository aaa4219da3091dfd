//! 文本替换引擎
//!
//! 在 DOM 文本节点中找到单词，将其拆分为 `前文 + 包装元素 + 后文`。
//! 包装元素记录原文和翻译信息，用于显示以及之后的还原。
//!
//! ## 规则
//! - 替换按位置从后往前处理
//! - 每个替换只包装一处出现
//! - 已被包装的内容不会再次包装（祖先检查 + 已包装单词过滤）
//! - 单个替换失败只跳过该替换

use std::collections::HashSet;

use markup5ever_rcdom::{Handle, NodeData};

use super::service::Replacement;
use crate::html::{create_element, create_text, get_node_attr, get_parent_node, get_text, normalize, replace_node, set_node_attr};
use crate::translation::config::{constants, DisplayMode, VocabConfig};
use crate::translation::error::helpers::log_error;
use crate::translation::error::TranslationError;
use crate::translation::pipeline::language::is_ideograph;
use crate::translation::pipeline::segmenter::{is_wrapper, qualifying_text_nodes};

const ATTR_ORIGINAL: &str = "data-original";
const ATTR_TRANSLATION: &str = "data-translation";

/// 文本替换器
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReplacer {
    display_mode: DisplayMode,
}

impl TextReplacer {
    pub fn new(display_mode: DisplayMode) -> Self {
        Self { display_mode }
    }

    pub fn from_config(config: &VocabConfig) -> Self {
        Self::new(config.display_mode)
    }

    /// 在 `root` 下应用替换，返回包装的数量
    pub fn apply_replacements(&self, root: &Handle, replacements: &[Replacement]) -> usize {
        let mut ordered: Vec<&Replacement> = replacements.iter().collect();
        ordered.sort_by(|a, b| b.position.cmp(&a.position));

        let mut wrapped = wrapped_words(root);
        let mut count = 0;

        for replacement in ordered {
            let key = replacement.original.trim().to_lowercase();
            if key.is_empty() || wrapped.contains(&key) {
                continue;
            }
            if is_identity_translation(replacement) {
                tracing::trace!("翻译与原文相同，跳过: {}", replacement.original);
                continue;
            }

            if self.wrap_first_occurrence(root, replacement) {
                wrapped.insert(key);
                count += 1;
            }
        }

        if count > 0 {
            set_node_attr(root, constants::PROCESSED_ATTR, Some("true".to_string()));
            tracing::debug!("包装了 {} 个单词", count);
        }
        count
    }

    fn wrap_first_occurrence(&self, root: &Handle, replacement: &Replacement) -> bool {
        for node in qualifying_text_nodes(root) {
            let Some(text) = get_text(&node) else {
                continue;
            };
            let Some((start, end)) = find_match(&text, &replacement.original) else {
                continue;
            };

            let matched = &text[start..end];
            if matched.to_lowercase() != replacement.original.trim().to_lowercase() {
                tracing::debug!("匹配范围与原文不一致: {} / {}", matched, replacement.original);
                continue;
            }
            if has_wrapper_ancestor(&node, root) {
                continue;
            }

            let mut pieces = Vec::with_capacity(3);
            if start > 0 {
                pieces.push(create_text(&text[..start]));
            }
            pieces.push(self.build_wrapper(matched, replacement));
            if end < text.len() {
                pieces.push(create_text(&text[end..]));
            }

            if replace_node(&node, pieces) {
                return true;
            }
            log_error(&TranslationError::DomError(format!(
                "文本节点已不在文档中，跳过: {}",
                replacement.original
            )));
            return false;
        }
        false
    }

    fn build_wrapper(&self, matched: &str, replacement: &Replacement) -> Handle {
        let mut attributes: Vec<(&str, &str)> = vec![
            ("class", constants::WRAPPER_CLASS),
            (ATTR_ORIGINAL, matched),
            (ATTR_TRANSLATION, replacement.translation.as_str()),
            ("data-difficulty", replacement.difficulty.as_str()),
            ("data-source-lang", replacement.source_lang.as_str()),
        ];
        let optional = [
            ("data-phonetic", replacement.phonetic.as_str()),
            ("data-pos", replacement.part_of_speech.as_str()),
            ("data-definition", replacement.short_definition.as_str()),
            ("data-example", replacement.example.as_str()),
        ];
        attributes.extend(optional.into_iter().filter(|(_, value)| !value.is_empty()));

        let wrapper = create_element(constants::WRAPPER_TAG, &attributes);
        crate::html::append_child(
            &wrapper,
            create_text(&self.display_mode.render(matched, &replacement.translation)),
        );
        wrapper
    }
}

/// 还原一个包装元素，返回是否成功
pub fn restore_element(wrapper: &Handle) -> bool {
    if !is_wrapper(wrapper) {
        return false;
    }
    let original = get_node_attr(wrapper, ATTR_ORIGINAL).unwrap_or_default();
    let Some(parent) = get_parent_node(wrapper) else {
        return false;
    };
    if !replace_node(wrapper, vec![create_text(&original)]) {
        return false;
    }
    normalize(&parent);
    true
}

/// 还原 `root` 下的所有包装元素并清除处理标记
pub fn restore_all(root: &Handle) -> usize {
    let restored = find_wrappers(root).iter().filter(|w| restore_element(w)).count();
    clear_processed_markers(root);
    if restored > 0 {
        tracing::info!("已还原 {} 个单词", restored);
    }
    restored
}

/// 还原某个单词的所有包装（标记为已掌握时使用）
pub fn remove_word(root: &Handle, word: &str) -> usize {
    let target = word.trim().to_lowercase();
    find_wrappers(root)
        .iter()
        .filter(|w| get_node_attr(w, ATTR_ORIGINAL).is_some_and(|o| o.to_lowercase() == target))
        .filter(|w| restore_element(w))
        .count()
}

/// `root` 下已包装的单词（小写）
pub fn wrapped_words(root: &Handle) -> HashSet<String> {
    find_wrappers(root)
        .iter()
        .filter_map(|w| get_node_attr(w, ATTR_ORIGINAL))
        .map(|o| o.to_lowercase())
        .collect()
}

/// 所有包装元素，包括 `root` 本身
pub fn find_wrappers(root: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_wrappers(root, &mut found);
    found
}

fn collect_wrappers(node: &Handle, found: &mut Vec<Handle>) {
    if is_wrapper(node) {
        found.push(node.clone());
        return;
    }
    for child in node.children.borrow().iter() {
        collect_wrappers(child, found);
    }
}

fn clear_processed_markers(node: &Handle) {
    if matches!(node.data, NodeData::Element { .. }) {
        set_node_attr(node, constants::PROCESSED_ATTR, None);
    }
    for child in node.children.borrow().iter() {
        clear_processed_markers(child);
    }
}

fn has_wrapper_ancestor(node: &Handle, root: &Handle) -> bool {
    let mut current = get_parent_node(node);
    while let Some(ancestor) = current {
        if is_wrapper(&ancestor) {
            return true;
        }
        if std::rc::Rc::ptr_eq(&ancestor, root) {
            return false;
        }
        current = get_parent_node(&ancestor);
    }
    false
}

fn is_identity_translation(replacement: &Replacement) -> bool {
    let original = replacement.original.trim();
    let translation = replacement.translation.trim();
    original.is_ascii() && translation.is_ascii() && original.eq_ignore_ascii_case(translation)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || is_ideograph(c)
}

/// 从 `start` 开始不区分大小写地匹配 `word`，返回结束位置
fn match_at(text: &str, start: usize, word: &[char]) -> Option<usize> {
    let mut end = start;
    let mut chars = text[start..].chars();
    for expected in word {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        end += actual.len_utf8();
    }
    Some(end)
}

/// 查找单词的字节范围：优先匹配完整单词边界，否则取第一个子串
pub fn find_match(text: &str, word: &str) -> Option<(usize, usize)> {
    let word: Vec<char> = word.trim().chars().collect();
    if word.is_empty() {
        return None;
    }

    let mut first_raw = None;
    for (start, _) in text.char_indices() {
        let Some(end) = match_at(text, start, &word) else {
            continue;
        };
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            return Some((start, end));
        }
        first_raw.get_or_insert((start, end));
    }
    first_raw
}
