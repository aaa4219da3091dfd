use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

use crate::translation::error::TranslationResult;

/// 序列化文档
pub fn serialize_document(dom: RcDom, document_encoding: &str) -> TranslationResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let s: &str = &String::from_utf8_lossy(&buf);
            let (data, _, _) = encoding.encode(s);
            buf = data.to_vec();
        }
    }

    Ok(buf)
}

/// 序列化单个节点（包含节点本身）
pub fn serialize_node(node: &Handle) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    serialize(&mut buf, &serializable, opts)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{get_body, get_child_node_by_name, html_to_dom};

    #[test]
    fn test_serialize_node_includes_element() {
        let dom = html_to_dom(b"<p class=\"x\">a &amp; b</p>", "utf-8");
        let body = get_body(&dom).unwrap();
        let p = get_child_node_by_name(&body, "p").unwrap();
        assert_eq!(serialize_node(&p).unwrap(), "<p class=\"x\">a &amp; b</p>");
    }

    #[test]
    fn test_serialize_document_round_trip() {
        let dom = html_to_dom(b"<html><head></head><body><p>hi</p></body></html>", "utf-8");
        let out = serialize_document(dom, "utf-8").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<html><head></head><body><p>hi</p></body></html>"
        );
    }
}
