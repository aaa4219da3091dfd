use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default()).one(s.as_str())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let matches = get_node_name(node) == Some(*node_name);

    if matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }

    let names = if matches && !rest.is_empty() { rest } else { node_names };
    for child_node in node.children.borrow().iter() {
        found_nodes.append(&mut find_nodes(child_node, names));
    }

    found_nodes
}

/// 文档的 body 元素
pub fn get_body(dom: &RcDom) -> Option<Handle> {
    find_nodes(&dom.document, &["html", "body"]).into_iter().next()
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| get_node_name(child) == Some(node_name))
        .cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 元素的 class 列表
pub fn get_class_list(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_class_list(node).iter().any(|c| c == class_name)
}

/// 获取父节点
///
/// `parent` 是一个 `Cell`，读取时必须先取出再放回，否则节点会和父节点断开。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 节点是否仍挂在 `root` 之下（含 `root` 本身）
pub fn is_attached_to(node: &Handle, root: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if Rc::ptr_eq(&n, root) {
            return true;
        }
        current = get_parent_node(&n);
    }
    false
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs_mut = attrs.borrow_mut();
        match attr_value {
            Some(value) => {
                if let Some(existing) = attrs_mut.iter_mut().find(|a| &*a.name.local == attr_name) {
                    existing.value = format_tendril!("{}", value);
                } else {
                    attrs_mut.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: format_tendril!("{}", value),
                    });
                }
            }
            None => attrs_mut.retain(|a| &*a.name.local != attr_name),
        }
    }
}

/// 创建一个不挂载的 HTML 元素
pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from(*value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建一个文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 文本节点的内容
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 节点及其后代的全部文本
pub fn get_text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 用一组新节点替换 `old`，返回 `old` 是否仍在树中
pub fn replace_node(old: &Handle, replacements: Vec<Handle>) -> bool {
    let Some(parent) = get_parent_node(old) else {
        return false;
    };

    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|c| Rc::ptr_eq(c, old)) else {
        return false;
    };

    for node in &replacements {
        node.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    old.parent.set(None);
    true
}

/// 合并相邻的文本节点，并移除空文本节点
pub fn normalize(node: &Handle) {
    let mut merged: Vec<Handle> = Vec::new();
    {
        let children = node.children.borrow();
        for child in children.iter() {
            if let NodeData::Text { contents } = &child.data {
                if contents.borrow().is_empty() {
                    child.parent.set(None);
                    continue;
                }
                if let Some(NodeData::Text { contents: prev }) = merged.last().map(|p| &p.data) {
                    prev.borrow_mut().push_tendril(&contents.borrow());
                    child.parent.set(None);
                    continue;
                }
            }
            merged.push(child.clone());
        }
    }
    *node.children.borrow_mut() = merged;

    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) {
            normalize(child);
        }
    }
}

/// 获取文档声明的字符集
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            return Some(charset);
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(content) = get_node_attr(meta_node, "content") {
                let charset = content
                    .split(';')
                    .filter_map(|part| part.trim().split_once('='))
                    .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
                    .map(|(_, value)| value.trim().trim_matches('"').to_string());
                if charset.is_some() {
                    return charset;
                }
            }
        }
    }

    None
}
