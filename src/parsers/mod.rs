//! # 解析器模块
//!
//! HTML文档解析、DOM操作与序列化。页面文本的分段与替换都建立在这里的树操作之上。

pub mod html;

pub use html::{html_to_dom, serialize_document};
