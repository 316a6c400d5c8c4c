//! Spine/tree equivalence: the spine at offset k mirrors the ancestor
//! chain of the node containing k in a full parse.
//!
//! Probes run at offsets strictly inside token runs (both neighbors
//! alphanumeric) and outside undecided `<!`/`<` prefixes, where the two
//! views are defined to agree; construct boundaries are pinned by the
//! hand-picked cases below.

mod common;

use common::CORPUS;
use xml::{Document, NodeId, Spine, StateKind, XmlParser};

fn spine_chain(spine: &Spine) -> Vec<(&'static str, usize)> {
    spine
        .entries()
        .iter()
        .filter_map(|entry| {
            let label = match entry.kind {
                StateKind::Document => "document",
                StateKind::Element => "element",
                StateKind::Attribute => "attribute",
                StateKind::ClosingTag => "closing-tag",
                StateKind::Comment => "comment",
                StateKind::CData => "cdata",
                StateKind::DocType => "doctype",
                StateKind::ProcessingInstruction => "processing-instruction",
                // Sub-token states build no construct of their own.
                StateKind::TagStart
                | StateKind::ElementName
                | StateKind::AttributeName
                | StateKind::AttributeValue
                | StateKind::EntityReference => return None,
            };
            Some((label, entry.start))
        })
        .collect()
}

fn tree_chain(document: &Document, offset: usize) -> Vec<(&'static str, usize)> {
    let mut chain: Vec<NodeId> = document.ancestors(document.node_at(offset)).collect();
    chain.reverse();
    chain
        .into_iter()
        .filter_map(|id| {
            let node = document.node(id);
            if matches!(node.kind(), xml::NodeKind::Text) {
                return None;
            }
            Some((node.kind().label(), node.span().start))
        })
        .collect()
}

#[test]
fn spine_equals_ancestor_chain_inside_token_runs() {
    for text in CORPUS {
        let document = XmlParser::parse(text);
        let bytes = text.as_bytes();
        for k in 1..text.len() {
            if !bytes[k - 1].is_ascii_alphanumeric() || !bytes[k].is_ascii_alphanumeric() {
                continue;
            }
            let spine = XmlParser::spine_at(text, k);
            if spine.innermost().kind == StateKind::TagStart {
                // `<!D`, `<![CD`...: the construct is genuinely undecided
                // until its opener literal completes.
                continue;
            }
            assert_eq!(
                spine_chain(&spine),
                tree_chain(&document, k),
                "parity failed for {text:?} at offset {k}"
            );
        }
    }
}

#[test]
fn spine_inside_nested_elements_matches_ancestry() {
    let text = "<a><b>hi</b></a>";
    let spine = XmlParser::spine_at(text, 7);
    assert_eq!(
        spine_chain(&spine),
        [("document", 0), ("element", 0), ("element", 3)]
    );
    let document = XmlParser::parse(text);
    assert_eq!(tree_chain(&document, 7), spine_chain(&spine));
}

#[test]
fn spine_inside_unmatched_closing_tag_matches_ancestry() {
    let text = "<a><b></c></a>";
    // Offset 8 sits inside the name of the unmatched `</c>`.
    let spine = XmlParser::spine_at(text, 8);
    assert_eq!(
        spine_chain(&spine),
        [
            ("document", 0),
            ("element", 0),
            ("element", 3),
            ("closing-tag", 6)
        ]
    );
    let document = XmlParser::parse(text);
    assert_eq!(tree_chain(&document, 8), spine_chain(&spine));
}

#[test]
fn spine_inside_attribute_value_matches_ancestry() {
    let text = "<a href=\"vvv\">";
    let spine = XmlParser::spine_at(text, 10);
    assert_eq!(
        spine_chain(&spine),
        [("document", 0), ("element", 0), ("attribute", 3)]
    );
    let document = XmlParser::parse(text);
    assert_eq!(tree_chain(&document, 10), spine_chain(&spine));
}
