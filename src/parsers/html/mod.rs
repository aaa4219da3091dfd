//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（查找、属性、节点创建与替换）
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

pub use dom::{
    append_child, create_element, create_text, find_nodes, get_body, get_charset,
    get_child_node_by_name, get_class_list, get_node_attr, get_node_name, get_parent_node,
    get_text, get_text_content, has_class, html_to_dom, is_attached_to, normalize, replace_node,
    set_node_attr,
};
pub use serializer::{serialize_document, serialize_node};
