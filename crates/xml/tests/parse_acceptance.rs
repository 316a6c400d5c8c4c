//! Whole-parse acceptance: totality, tree shape, span discipline.

mod common;

use common::CORPUS;
use xml::{NodeKind, XmlParser};

#[test]
fn full_parse_always_completes_with_a_tree() {
    for text in CORPUS {
        let document = XmlParser::parse(text);
        // The document node always exists and spans the whole input.
        let root = document.node(xml::NodeId::DOCUMENT);
        assert_eq!(root.span().start, 0, "input: {text:?}");
        assert_eq!(root.span().end(), text.len(), "input: {text:?}");
        assert!(root.is_sealed(), "input: {text:?}");
    }
}

#[test]
fn every_node_is_sealed_and_contained_by_its_parent() {
    for text in CORPUS {
        let document = XmlParser::parse(text);
        for id in document.node_ids() {
            let node = document.node(id);
            assert!(node.is_sealed(), "unsealed node in {text:?}");
            assert!(
                node.span().end() <= text.len(),
                "span out of bounds in {text:?}: {:?}",
                node.span()
            );
            if let Some(parent) = node.parent() {
                assert!(
                    document.node(parent).span().contains_span(node.span()),
                    "parent does not contain child in {text:?}: parent {:?}, child {:?}",
                    document.node(parent).span(),
                    node.span()
                );
            }
        }
    }
}

#[test]
fn diagnostic_spans_are_in_bounds_and_messages_format() {
    for text in CORPUS {
        let document = XmlParser::parse(text);
        for diagnostic in document.diagnostics() {
            assert!(
                diagnostic.span.end() <= text.len(),
                "diagnostic span out of bounds in {text:?}: {diagnostic:?}"
            );
            // Message formatting must never panic for emitted diagnostics.
            assert!(!diagnostic.message().is_empty());
        }
    }
}

#[test]
fn adversarial_single_characters_parse() {
    for ch in ['<', '>', '&', '"', '\'', '/', '!', '?', '=', ']', '-', 'x', '\u{1F600}'] {
        let text = ch.to_string();
        let _ = XmlParser::parse(&text);
    }
}

#[test]
fn deep_nesting_parses_without_blowing_up() {
    let depth = 1000usize;
    let mut text = String::new();
    for _ in 0..depth {
        text.push_str("<d>");
    }
    for _ in 0..depth {
        text.push_str("</d>");
    }
    let document = XmlParser::parse(&text);
    assert!(document.diagnostics().is_empty());

    let mut count = 0usize;
    let mut current = document.root_element();
    while let Some(id) = current {
        count += 1;
        let data = document.node(id).as_element().expect("element");
        assert!(data.is_ended);
        current = document
            .node(id)
            .child_ids()
            .iter()
            .copied()
            .find(|child| matches!(document.node(*child).kind(), NodeKind::Element(_)));
    }
    assert_eq!(count, depth);
}

#[test]
fn first_top_level_element_is_the_root() {
    let document = XmlParser::parse("<?xml version=\"1.0\"?><!-- c --><r><x/></r>");
    let root = document.root_element().expect("root element");
    assert_eq!(
        document.node(root).name().map(|n| n.value.as_str()),
        Some("r")
    );
    // Leading PI and comment stay ordinary top-level children.
    assert_eq!(document.root_children().len(), 3);
}

#[test]
fn node_at_and_ancestors_agree_on_a_nested_offset() {
    let text = "<a><b>hi</b></a>";
    let document = XmlParser::parse(text);
    let hit = document.node_at(6);
    assert!(matches!(document.node(hit).kind(), NodeKind::Text));
    let chain: Vec<&str> = document
        .ancestors(hit)
        .map(|id| document.node(id).kind().label())
        .collect();
    assert_eq!(chain, ["text", "element", "element", "document"]);
}
