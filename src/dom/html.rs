//! HTML loading using html5ever's reference tree

use super::{Document, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse markup into an element-only [`Document`]
pub(super) fn parse(markup: &str) -> Document {
    let dom = parse_document(RcDom::default(), Default::default()).one(markup);
    let mut document = Document::new();

    for child in dom.document.children.borrow().iter() {
        if let Some(id) = convert(&mut document, child) {
            if document.document_element().is_none() {
                document.set_document_element(id);
            }
        }
    }

    document
}

fn convert(document: &mut Document, handle: &Handle) -> Option<NodeId> {
    let NodeData::Element { name, attrs, .. } = &handle.data else {
        return None;
    };

    let id = document.create_element(name.local.to_string());
    if let Some(element) = document.element_mut(id) {
        for attr in attrs.borrow().iter() {
            element.set_attribute(attr.name.local.to_string(), attr.value.to_string());
        }
    }

    for child in handle.children.borrow().iter() {
        if let Some(child_id) = convert(document, child) {
            document.append_child(id, child_id);
        }
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use crate::dom::{Document, PathResolver};

    #[test]
    fn test_parse_builds_element_tree() {
        let doc = Document::parse_html(
            "<html><head><title>t</title></head><body><p id=\"a\">x</p><div><span></span></div></body></html>",
        );
        let body = doc.body().unwrap();
        let children = doc.children(body);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.element(children[0]).unwrap().id(), Some(&"a".to_string()));

        let span = doc.get_elements_by_tag_name("span")[0];
        assert_eq!(
            PathResolver::default().resolve(&doc, Some(span)).as_deref(),
            Some("/0/1/0")
        );
    }

    #[test]
    fn test_parse_fragment_gets_implied_body() {
        let doc = Document::parse_html("<p>hello</p>");
        assert!(doc.body().is_some());
        assert_eq!(doc.get_elements_by_tag_name("p").len(), 1);
    }
}
