//! Deterministic tree serialization for test comparisons.
//!
//! One line per node, indented by depth. Not a stable public format; two
//! parses are considered equivalent exactly when their snapshot lines and
//! diagnostics match.

use std::fmt;

use crate::dom::{Document, NodeId, NodeKind};

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(document: &Document) -> Self {
        let mut lines = Vec::new();
        walk(document, NodeId::DOCUMENT, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
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
                line.push_str(&format!(" ={:?}", value));
            }
            if attribute.is_complete {
                line.push_str(" complete");
            }
        }
        NodeKind::ClosingTag(closing) => {
            if !closing.is_named() {
                line.push_str(" unnamed");
            }
        }
        NodeKind::DocType(doctype) => {
            if let Some(public_id) = doctype.public_id_span {
                line.push_str(&format!(" public[{}..{})", public_id.start, public_id.end()));
            }
            if let Some(system_id) = doctype.system_id_span {
                line.push_str(&format!(" system[{}..{})", system_id.start, system_id.end()));
            }
            if let Some(subset) = doctype.internal_subset_span {
                line.push_str(&format!(" subset[{}..{})", subset.start, subset.end()));
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

#[cfg(test)]
mod tests {
    use super::DomSnapshot;
    use crate::XmlParser;

    #[test]
    fn snapshot_is_stable_for_a_simple_document() {
        let document = XmlParser::parse("<a href=\"x\">y</a>");
        let snapshot = DomSnapshot::new(&document);
        assert_eq!(
            snapshot.as_lines(),
            &[
                "document [0..17)",
                "  element [0..17) \"a\" complete ended",
                "    attribute [3..11) \"href\" =\"x\" complete",
                "    text [12..13)",
                "    closing-tag [13..17) \"a\"",
            ],
            "unexpected snapshot:\n{snapshot}"
        );
    }

    #[test]
    fn equal_documents_render_equal_snapshots() {
        let left = XmlParser::parse("<r><x/><x/></r>");
        let right = XmlParser::parse("<r><x/><x/></r>");
        assert_eq!(
            DomSnapshot::new(&left).render(),
            DomSnapshot::new(&right).render()
        );
    }
}
