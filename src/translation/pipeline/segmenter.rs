//! 内容分段模块
//!
//! 将 DOM 子树转换为一组互不重叠、尚未处理过的文本段。
//!
//! - 只接受块级容器，且其"直接"可见文本必须足够长
//! - 跳过脚本、代码、可编辑区域、隐藏元素和已替换的包装元素
//! - 通过指纹去重，指纹集合只在 [`ContentSegmenter::reset`] 时清空

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use markup5ever_rcdom::{Handle, NodeData, WeakHandle};

use crate::parsers::html::dom::{get_class_list, get_node_attr, get_node_name, get_parent_node};
use crate::translation::config::{constants, VocabConfig};

use super::filters::is_code_like;

/// 一个待处理的文本段
#[derive(Debug, Clone)]
pub struct Segment {
    /// 容器元素的弱引用，不拥有页面节点
    pub element: WeakHandle,
    pub text: String,
    pub fingerprint: String,
    pub path: String,
}

impl Segment {
    /// 容器元素，若已从树中释放则返回 `None`
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade()
    }
}

/// 元素的包围盒（文档坐标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

/// 当前视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_y: f64,
    pub height: f64,
}

/// 布局信息提供者
///
/// 没有渲染引擎时使用 [`NoLayout`]，所有元素都视为可见。
pub trait LayoutProvider {
    fn bounding_rect(&self, element: &Handle) -> Option<Rect>;
    fn viewport(&self) -> Viewport;
}

/// 无布局信息
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl LayoutProvider for NoLayout {
    fn bounding_rect(&self, _element: &Handle) -> Option<Rect> {
        None
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            scroll_y: 0.0,
            height: f64::INFINITY,
        }
    }
}

/// 分段选项
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    pub viewport_only: bool,
    pub margin: f64,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            viewport_only: false,
            margin: constants::DEFAULT_VIEWPORT_MARGIN,
        }
    }
}

impl SegmentOptions {
    pub fn from_config(config: &VocabConfig) -> Self {
        Self {
            viewport_only: config.viewport_only,
            margin: config.viewport_margin,
        }
    }
}

fn is_tag_in(node: &Handle, tags: &[&str]) -> bool {
    get_node_name(node).is_some_and(|name| tags.contains(&name))
}

/// 是否为块级文本容器
pub fn is_block_element(node: &Handle) -> bool {
    is_tag_in(node, constants::BLOCK_ELEMENTS)
}

/// 是否为计入直接文本的行内元素
pub fn is_inline_element(node: &Handle) -> bool {
    is_tag_in(node, constants::INLINE_ELEMENTS)
}

/// 是否为替换后插入的包装元素
pub fn is_wrapper(node: &Handle) -> bool {
    get_node_name(node) == Some(constants::WRAPPER_TAG)
        && get_class_list(node).iter().any(|c| c == constants::WRAPPER_CLASS)
}

/// 是否已被标记为处理过
pub fn is_marked_processed(node: &Handle) -> bool {
    get_node_attr(node, constants::PROCESSED_ATTR).is_some()
}

fn has_skip_class(node: &Handle) -> bool {
    get_class_list(node).iter().any(|class| {
        constants::SKIP_CLASSES.iter().any(|skip| {
            if skip.ends_with('-') {
                class.starts_with(skip)
            } else {
                class == skip
            }
        })
    })
}

fn is_hidden(node: &Handle) -> bool {
    if get_node_attr(node, "hidden").is_some() {
        return true;
    }
    if get_node_attr(node, "aria-hidden").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return true;
    }
    get_node_attr(node, "style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

fn is_editable(node: &Handle) -> bool {
    get_node_attr(node, "contenteditable").is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

/// 元素本身是否应被排除（不含"已处理"标记）
fn is_excluded_element(node: &Handle) -> bool {
    is_tag_in(node, constants::SKIP_ELEMENTS) || has_skip_class(node) || is_hidden(node) || is_editable(node)
}

/// 节点是否应被跳过
///
/// 文本节点取决于其父元素；元素检查标签、跳过类名、隐藏状态、可编辑性和处理标记。
pub fn should_skip_node(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { .. } => match get_parent_node(node) {
            Some(parent) => should_skip_node(&parent),
            None => true,
        },
        NodeData::Element { .. } => is_excluded_element(node) || is_marked_processed(node),
        _ => false,
    }
}

/// 容器内合格的文本节点
///
/// 只进入允许的行内元素；被排除的元素、包装元素、嵌套的块级容器
/// 以及其他非行内元素（如 `nav`、`form`）都不计入。
pub fn qualifying_text_nodes(container: &Handle) -> Vec<Handle> {
    let mut nodes = Vec::new();
    for child in container.children.borrow().iter() {
        collect_qualifying(child, &mut nodes);
    }
    nodes
}

fn collect_qualifying(node: &Handle, nodes: &mut Vec<Handle>) {
    match &node.data {
        NodeData::Text { .. } => nodes.push(node.clone()),
        NodeData::Element { .. } => {
            if is_excluded_element(node) || is_wrapper(node) || !is_inline_element(node) {
                return;
            }
            for child in node.children.borrow().iter() {
                collect_qualifying(child, nodes);
            }
        }
        _ => {}
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(node: &Handle) -> String {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().to_string(),
        _ => String::new(),
    }
}

/// 容器的直接文本（未排除代码文本）
fn direct_text(container: &Handle) -> String {
    let raw: String = qualifying_text_nodes(container).iter().map(text_of).collect();
    collapse_whitespace(&raw)
}

/// 容器的可翻译文本：合格文本节点拼接，折叠空白，排除代码文本
pub fn get_text_content(element: &Handle) -> String {
    let raw: String = qualifying_text_nodes(element)
        .iter()
        .map(text_of)
        .filter(|text| !is_code_like(text))
        .collect();
    collapse_whitespace(&raw)
}

/// 生成段落指纹：只使用文本的前 100 个字符和结构路径
pub fn generate_fingerprint(text: &str, path: &str) -> String {
    let prefix: String = text.chars().take(constants::FINGERPRINT_PREFIX_CHARS).collect();
    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b"|");
    hasher.update(path.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}

/// 元素的结构路径，形如 `html:0>body:1>p:2`
pub fn element_path(element: &Handle) -> String {
    let mut parts = Vec::new();
    let mut current = element.clone();

    while let Some(name) = get_node_name(&current).map(str::to_string) {
        let parent = get_parent_node(&current);
        let index = parent
            .as_ref()
            .and_then(|p| {
                p.children
                    .borrow()
                    .iter()
                    .filter(|c| matches!(c.data, NodeData::Element { .. }))
                    .position(|c| Rc::ptr_eq(c, &current))
            })
            .unwrap_or(0);
        parts.push(format!("{}:{}", name, index));

        match parent {
            Some(p) => current = p,
            None => break,
        }
    }

    parts.reverse();
    parts.join(">")
}

fn in_viewport(layout: &dyn LayoutProvider, element: &Handle, margin: f64) -> bool {
    let Some(rect) = layout.bounding_rect(element) else {
        return true;
    };
    let viewport = layout.viewport();
    rect.bottom >= viewport.scroll_y - margin && rect.top <= viewport.scroll_y + viewport.height + margin
}

/// 内容分段器
pub struct ContentSegmenter {
    min_segment_length: usize,
    max_segment_length: usize,
    processed: Mutex<HashSet<String>>,
}

impl ContentSegmenter {
    pub fn new(min_segment_length: usize, max_segment_length: usize) -> Self {
        Self {
            min_segment_length,
            max_segment_length,
            processed: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &VocabConfig) -> Self {
        Self::new(config.min_segment_length, config.max_segment_length)
    }

    /// 查找文本容器
    pub fn find_text_containers(&self, root: &Handle) -> Vec<Handle> {
        let mut containers = Vec::new();
        self.walk_containers(root, &mut containers);
        containers
    }

    fn walk_containers(&self, node: &Handle, containers: &mut Vec<Handle>) {
        match &node.data {
            NodeData::Element { .. } => {
                if is_excluded_element(node) || is_wrapper(node) {
                    return;
                }
                // 已处理的容器本身不再接受，但其中嵌套的块仍可能是新容器
                if is_block_element(node)
                    && !is_marked_processed(node)
                    && direct_text(node).chars().count() > constants::MIN_DIRECT_TEXT_LENGTH
                {
                    containers.push(node.clone());
                }
            }
            NodeData::Document => {}
            _ => return,
        }

        for child in node.children.borrow().iter() {
            self.walk_containers(child, containers);
        }
    }

    /// 生成页面文本段
    pub fn get_page_segments(
        &self,
        root: &Handle,
        options: SegmentOptions,
        layout: &dyn LayoutProvider,
    ) -> Vec<Segment> {
        let mut segments = Vec::new();

        for container in self.find_text_containers(root) {
            if options.viewport_only && !in_viewport(layout, &container, options.margin) {
                continue;
            }

            let mut text = get_text_content(&container);
            if text.chars().count() < self.min_segment_length {
                continue;
            }
            if text.chars().count() > self.max_segment_length {
                text = text.chars().take(self.max_segment_length).collect();
            }

            let path = element_path(&container);
            let fingerprint = generate_fingerprint(&text, &path);
            if !self.mark_processed(&fingerprint) {
                tracing::trace!("跳过已处理的段落: {}", path);
                continue;
            }

            segments.push(Segment {
                element: Rc::downgrade(&container),
                text,
                fingerprint,
                path,
            });
        }

        tracing::debug!("本次分段得到 {} 个段落", segments.len());
        segments
    }

    fn processed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.processed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 记录指纹，已存在时返回 `false`
    fn mark_processed(&self, fingerprint: &str) -> bool {
        self.processed().insert(fingerprint.to_string())
    }

    pub fn is_processed(&self, fingerprint: &str) -> bool {
        self.processed().contains(fingerprint)
    }

    pub fn processed_count(&self) -> usize {
        self.processed().len()
    }

    /// 清空指纹集合（恢复原文时调用）
    pub fn reset(&self) {
        self.processed().clear();
    }
}

impl Default for ContentSegmenter {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MIN_SEGMENT_LENGTH, constants::DEFAULT_MAX_SEGMENT_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_nodes, get_body, html_to_dom};

    fn body(html: &str) -> Handle {
        let dom = html_to_dom(html.as_bytes(), "utf-8");
        let body = get_body(&dom).unwrap();
        // RcDom's Drop drains descendants; keep the fixture tree alive.
        std::mem::forget(dom);
        body
    }

    #[test]
    fn test_fingerprint_ignores_text_after_prefix() {
        let base: String = "a".repeat(150);
        let first = format!("{}{}", base, "x".repeat(350));
        let second = format!("{}{}", base, "y".repeat(350));
        assert_eq!(
            generate_fingerprint(&first, "body:1>p:0"),
            generate_fingerprint(&second, "body:1>p:0")
        );
        assert_ne!(
            generate_fingerprint(&first, "body:1>p:0"),
            generate_fingerprint(&first, "body:1>p:1")
        );
        assert_eq!(generate_fingerprint("abc", "p:0").len(), 16);
    }

    #[test]
    fn test_containers_use_direct_text_only() {
        let root = body(
            "<div>short<p>This paragraph has plenty of text in it.</p></div>\
             <div>Outer text that is long enough <em>with emphasis</em><p>Inner paragraph text here.</p></div>",
        );
        let segmenter = ContentSegmenter::default();
        let containers = segmenter.find_text_containers(&root);
        let names: Vec<&str> = containers.iter().filter_map(get_node_name).collect();
        assert_eq!(names, vec!["p", "div", "p"]);
        assert_eq!(get_text_content(&containers[1]), "Outer text that is long enough with emphasis");
    }

    #[test]
    fn test_non_inline_descendants_are_not_direct_text() {
        let root = body(
            "<div><nav>Home About Products Contact Newsletter</nav>\
             <form>Subscribe to receive weekly updates now</form></div>\
             <div>Weekly science digest for readers <a href=\"/x\">and <b>friends</b></a>\
             <nav>Home About Products</nav><my-widget>Custom element text here</my-widget></div>",
        );
        let segmenter = ContentSegmenter::default();
        let containers = segmenter.find_text_containers(&root);
        assert_eq!(containers.len(), 1);
        assert_eq!(
            get_text_content(&containers[0]),
            "Weekly science digest for readers and friends"
        );
    }

    #[test]
    fn test_skipped_regions() {
        let root = body(
            "<p>Visible paragraph with enough text.<code>let x = 1;</code></p>\
             <div style=\"display: none\"><p>Hidden paragraph with enough text.</p></div>\
             <div contenteditable=\"true\"><p>Editable paragraph with enough text.</p></div>\
             <p class=\"notranslate\">Marked paragraph with enough text.</p>\
             <p aria-hidden=\"true\">Aria hidden paragraph with text.</p>",
        );
        let segmenter = ContentSegmenter::default();
        let containers = segmenter.find_text_containers(&root);
        assert_eq!(containers.len(), 1);
        assert_eq!(get_text_content(&containers[0]), "Visible paragraph with enough text.");
    }

    #[test]
    fn test_text_node_defers_to_parent() {
        let root = body("<p>plain</p><script>var a = 1</script>");
        let p = find_nodes(&root, &["p"]).remove(0);
        let script = find_nodes(&root, &["script"]).remove(0);
        assert!(!should_skip_node(&p.children.borrow()[0]));
        assert!(should_skip_node(&script.children.borrow()[0]));
    }

    #[test]
    fn test_segments_are_deduplicated_until_reset() {
        let root = body("<p>Technology has changed our lives in many ways.</p>");
        let segmenter = ContentSegmenter::default();

        let first = segmenter.get_page_segments(&root, SegmentOptions::default(), &NoLayout);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "Technology has changed our lives in many ways.");
        assert!(first[0].element().is_some());

        let second = segmenter.get_page_segments(&root, SegmentOptions::default(), &NoLayout);
        assert!(second.is_empty());

        segmenter.reset();
        let third = segmenter.get_page_segments(&root, SegmentOptions::default(), &NoLayout);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].fingerprint, first[0].fingerprint);
    }

    #[test]
    fn test_segment_length_bounds() {
        let long = "word ".repeat(60);
        let root = body(&format!("<p>tiny text here</p><p>{}</p>", long));
        let segmenter = ContentSegmenter::new(20, 50);
        let segments = segmenter.get_page_segments(&root, SegmentOptions::default(), &NoLayout);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text.chars().count(), 50);
    }

    struct FixedLayout;

    impl LayoutProvider for FixedLayout {
        fn bounding_rect(&self, element: &Handle) -> Option<Rect> {
            let top: f64 = get_node_attr(element, "data-top")?.parse().ok()?;
            Some(Rect { top, bottom: top + 20.0 })
        }

        fn viewport(&self) -> Viewport {
            Viewport { scroll_y: 0.0, height: 800.0 }
        }
    }

    #[test]
    fn test_viewport_filtering() {
        let root = body(
            "<p data-top=\"100\">Paragraph near the top of the page.</p>\
             <p data-top=\"5000\">Paragraph far below the visible area.</p>",
        );
        let segmenter = ContentSegmenter::default();
        let options = SegmentOptions { viewport_only: true, margin: 500.0 };
        let segments = segmenter.get_page_segments(&root, options, &FixedLayout);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.starts_with("Paragraph near"));
    }

    #[test]
    fn test_element_path() {
        let root = body("<div><p>a</p><p>b</p></div>");
        let second = find_nodes(&root, &["p"]).remove(1);
        assert_eq!(element_path(&second), "html:0>body:1>div:0>p:1");
    }
}
