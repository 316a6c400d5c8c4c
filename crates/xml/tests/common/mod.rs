//! Shared corpus and tree rendering for the integration suites.
#![allow(dead_code)]

use xml::{Document, NodeId, NodeKind};

/// Well-formed and deliberately broken inputs; every integration property
/// must hold across all of them.
pub const CORPUS: &[&str] = &[
    "",
    "x",
    "<a/>",
    "<a>x</a>",
    "<a href=\"v\" id='2'><b/>text</a>",
    "<a><b></c></a>",
    "<!-- c --><a/>",
    "<!--a--b-->",
    "<![CDATA[ <x> ]]>",
    "<?xml version=\"1.0\"?><root/>",
    "<!DOCTYPE html PUBLIC \"p\" \"s\" [<!x>]><r/>",
    "<a b=c d>",
    "<a b=\"1\" b='2'/>",
    "< a>",
    "<>",
    "</nope>",
    "<a <b/>",
    "&amp; &bad &x;",
    "<a b=\"x<c>\"</a>",
    "<a:b:c xmlns:p='u'/>",
    "<a>caf\u{e9} \u{1F600}</a>",
    "<<<<",
    ">>>",
    "<a",
    "<a href=\"",
    "<!DOCTYPE",
    "<!",
    "<!-",
    "<![CDAT",
    "<?",
    "</",
    "<a b=",
];

/// Deterministic, allocation-happy rendering of a finished tree. Two parses
/// are equivalent exactly when their lines and diagnostics match.
pub fn tree_lines(document: &Document) -> Vec<String> {
    let mut lines = Vec::new();
    walk(document, NodeId::DOCUMENT, 0, &mut lines);
    lines
}

fn walk(document: &Document, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    let node = document.node(id);
    let span = node.span();
    let mut line = format!(
        "{:indent$}{} [{}..{})",
        "",
        node.kind().label(),
        span.start,
        span.end(),
        indent = depth * 2
    );
    if let Some(name) = node.name() {
        line.push_str(&format!(" \"{}\"", name.value));
    }
    match node.kind() {
        NodeKind::Element(element) => {
            if element.is_self_closing {
                line.push_str(" self-closing");
            }
            if element.is_complete {
                line.push_str(" complete");
            }
            if element.is_ended {
                line.push_str(" ended");
            }
        }
        NodeKind::Attribute(attribute) => {
            if let Some(value) = &attribute.value {
                line.push_str(&format!(" ={value:?}"));
            }
            if attribute.is_complete {
                line.push_str(" complete");
            }
        }
        _ => {}
    }
    lines.push(line);

    if let NodeKind::Element(element) = node.kind() {
        for &attribute in &element.attributes {
            walk(document, attribute, depth + 1, lines);
        }
    }
    for &child in node.child_ids() {
        walk(document, child, depth + 1, lines);
    }
    if let NodeKind::Element(element) = node.kind()
        && let Some(closing) = element.closing_tag
    {
        walk(document, closing, depth + 1, lines);
    }
}
