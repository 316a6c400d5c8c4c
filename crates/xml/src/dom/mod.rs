//! Arena-backed document tree.
//!
//! Nodes live in a flat `Vec` and address each other by `NodeId`. Parents own
//! their children's ids; children keep a non-owning parent id, so there are
//! no reference cycles and snapshotting a tree is a plain clone of the
//! arena.
//!
//! Invariants:
//! - Node 0 is always the document node.
//! - A node's span contains the spans of all of its children once the node
//!   is sealed; spans only ever grow during a parse.
//! - An element's matched closing tag hangs off `ElementData::closing_tag`,
//!   not the child list; unmatched closing tags are recorded as ordinary
//!   children of whatever container they appeared in.

use crate::shared::{Diagnostic, TextSpan};

/// Index of a node in its document's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u32);

impl NodeId {
    /// The document node itself.
    pub const DOCUMENT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A possibly prefixed XML name plus the span it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XmlName {
    pub value: String,
    pub span: TextSpan,
}

impl XmlName {
    pub fn new(value: impl Into<String>, span: TextSpan) -> Self {
        Self {
            value: value.into(),
            span,
        }
    }

    /// Namespace prefix, when the name contains a `:`.
    pub fn prefix(&self) -> Option<&str> {
        self.value.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.value
            .split_once(':')
            .map_or(self.value.as_str(), |(_, local)| local)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementData {
    pub name: Option<XmlName>,
    /// Attribute node ids in source order.
    pub attributes: Vec<NodeId>,
    pub closing_tag: Option<NodeId>,
    pub is_self_closing: bool,
    /// Name fully parsed; says nothing about being closed.
    pub is_complete: bool,
    /// Opening tag, content and closing tag all resolved (or self-closed).
    pub is_ended: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeData {
    pub name: Option<XmlName>,
    pub value: Option<String>,
    pub value_span: Option<TextSpan>,
    /// Quote character delimiting the value; `None` for the unquoted error
    /// form.
    pub delimiter: Option<char>,
    pub is_complete: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosingTagData {
    pub name: Option<XmlName>,
}

impl ClosingTagData {
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocTypeData {
    pub name: Option<XmlName>,
    pub public_id_span: Option<TextSpan>,
    pub system_id_span: Option<TextSpan>,
    pub internal_subset_span: Option<TextSpan>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessingInstructionData {
    /// The instruction target, e.g. `xml` in `<?xml ... ?>`.
    pub name: Option<XmlName>,
}

/// Node payload, one variant per construct.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Attribute(AttributeData),
    ClosingTag(ClosingTagData),
    Text,
    Comment,
    CData,
    DocType(DocTypeData),
    ProcessingInstruction(ProcessingInstructionData),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element(_) => "element",
            NodeKind::Attribute(_) => "attribute",
            NodeKind::ClosingTag(_) => "closing-tag",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::CData => "cdata",
            NodeKind::DocType(_) => "doctype",
            NodeKind::ProcessingInstruction(_) => "processing-instruction",
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeData {
    kind: NodeKind,
    span: TextSpan,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    sealed: bool,
}

impl NodeData {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn span(&self) -> TextSpan {
        self.span
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered content children (attributes and matched closing tags are
    /// reachable through `ElementData`, not here).
    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the construct reached its close condition or was force-closed
    /// by recovery/EOF. No span of a sealed node ever changes again.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Named-object capability: the name shared by elements, attributes,
    /// closing tags, doctypes and processing instructions.
    pub fn name(&self) -> Option<&XmlName> {
        match &self.kind {
            NodeKind::Element(data) => data.name.as_ref(),
            NodeKind::Attribute(data) => data.name.as_ref(),
            NodeKind::ClosingTag(data) => data.name.as_ref(),
            NodeKind::DocType(data) => data.name.as_ref(),
            NodeKind::ProcessingInstruction(data) => data.name.as_ref(),
            NodeKind::Document | NodeKind::Text | NodeKind::Comment | NodeKind::CData => None,
        }
    }

    pub fn name_span(&self) -> Option<TextSpan> {
        self.name().map(|name| name.span)
    }

    /// Container capability: document and element nodes hold ordered
    /// children.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Document | NodeKind::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeData> {
        match &self.kind {
            NodeKind::Attribute(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_closing_tag(&self) -> Option<&ClosingTagData> {
        match &self.kind {
            NodeKind::ClosingTag(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_doctype(&self) -> Option<&DocTypeData> {
        match &self.kind {
            NodeKind::DocType(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_processing_instruction(&self) -> Option<&ProcessingInstructionData> {
        match &self.kind {
            NodeKind::ProcessingInstruction(data) => Some(data),
            _ => None,
        }
    }
}

/// The parsed tree plus its diagnostics, in parse order.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    nodes: Vec<NodeData>,
    diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                span: TextSpan::new(0, 0),
                parent: None,
                children: Vec::new(),
                sealed: false,
            }],
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn push_node(&mut self, kind: NodeKind, start: usize, parent: NodeId) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena overflow"));
        self.nodes.push(NodeData {
            kind,
            span: TextSpan::new(start, 0),
            parent: Some(parent),
            children: Vec::new(),
            sealed: false,
        });
        id
    }

    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.nodes[parent.index()].is_container(),
            "only containers hold children"
        );
        self.nodes[parent.index()].children.push(child);
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.index()].parent = Some(parent);
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    /// Seal `id` with the half-open end offset `end`.
    ///
    /// Spans are monotonic: sealing never moves a start and never shrinks an
    /// already-sealed node.
    pub(crate) fn seal(&mut self, id: NodeId, end: usize) {
        let node = &mut self.nodes[id.index()];
        debug_assert!(!node.sealed, "node sealed twice: {id:?}");
        debug_assert!(end >= node.span.start, "seal would move span start");
        node.span = TextSpan::from_bounds(node.span.start, end);
        node.sealed = true;
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    /// All node ids in creation (parse) order, document node first.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Top-level nodes in source order.
    pub fn root_children(&self) -> &[NodeId] {
        self.node(NodeId::DOCUMENT).child_ids()
    }

    /// The document's element root: the first top-level element, when one
    /// exists.
    pub fn root_element(&self) -> Option<NodeId> {
        self.root_children()
            .iter()
            .copied()
            .find(|id| matches!(self.node(*id).kind(), NodeKind::Element(_)))
    }

    /// Deepest node whose span contains `offset`, defaulting to the document
    /// node.
    ///
    /// Descends through content children, attributes and matched closing
    /// tags, so an offset inside `</a>` resolves to the closing-tag node.
    pub fn node_at(&self, offset: usize) -> NodeId {
        let mut current = NodeId::DOCUMENT;
        'descend: loop {
            let node = self.node(current);
            for &child in node.child_ids() {
                if self.node(child).span().contains(offset) {
                    current = child;
                    continue 'descend;
                }
            }
            if let NodeKind::Element(element) = node.kind() {
                for &attribute in &element.attributes {
                    if self.node(attribute).span().contains(offset) {
                        current = attribute;
                        continue 'descend;
                    }
                }
                if let Some(closing) = element.closing_tag
                    && self.node(closing).span().contains(offset)
                {
                    current = closing;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Walk from `id` up to the document node, inclusive of `id`.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: Some(id),
        }
    }
}

pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.node(current).parent();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, ElementData, NodeId, NodeKind, XmlName};
    use crate::shared::TextSpan;

    fn sample_document() -> Document {
        // Hand-assembled arena for "<a><b/></a>"-shaped structure.
        let mut document = Document::new();
        let a = document.push_node(
            NodeKind::Element(ElementData {
                name: Some(XmlName::new("a", TextSpan::new(1, 1))),
                ..ElementData::default()
            }),
            0,
            NodeId::DOCUMENT,
        );
        document.add_child(NodeId::DOCUMENT, a);
        let b = document.push_node(
            NodeKind::Element(ElementData {
                name: Some(XmlName::new("b", TextSpan::new(4, 1))),
                is_self_closing: true,
                ..ElementData::default()
            }),
            3,
            a,
        );
        document.add_child(a, b);
        document.seal(b, 7);
        document.seal(a, 11);
        document.seal(NodeId::DOCUMENT, 11);
        document
    }

    #[test]
    fn node_at_returns_deepest_containing_node() {
        let document = sample_document();
        let hit = document.node_at(4);
        assert_eq!(document.node(hit).name().map(|n| n.value.as_str()), Some("b"));
        let outer = document.node_at(1);
        assert_eq!(
            document.node(outer).name().map(|n| n.value.as_str()),
            Some("a")
        );
        assert_eq!(document.node_at(100), NodeId::DOCUMENT);
    }

    #[test]
    fn ancestors_walk_up_to_document() {
        let document = sample_document();
        let b = document.node_at(4);
        let chain: Vec<&'static str> = document
            .ancestors(b)
            .map(|id| document.node(id).kind().label())
            .collect();
        assert_eq!(chain, ["element", "element", "document"]);
    }

    #[test]
    fn prefixed_names_split_on_colon() {
        let name = XmlName::new("svg:rect", TextSpan::new(1, 8));
        assert_eq!(name.prefix(), Some("svg"));
        assert_eq!(name.local_name(), "rect");
        let plain = XmlName::new("rect", TextSpan::new(1, 4));
        assert_eq!(plain.prefix(), None);
        assert_eq!(plain.local_name(), "rect");
    }

    #[test]
    fn root_element_skips_non_element_leaders() {
        let mut document = Document::new();
        let comment = document.push_node(NodeKind::Comment, 0, NodeId::DOCUMENT);
        document.add_child(NodeId::DOCUMENT, comment);
        document.seal(comment, 7);
        assert_eq!(document.root_element(), None);
        let element = document.push_node(
            NodeKind::Element(ElementData::default()),
            7,
            NodeId::DOCUMENT,
        );
        document.add_child(NodeId::DOCUMENT, element);
        assert_eq!(document.root_element(), Some(element));
    }
}
