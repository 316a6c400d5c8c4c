//! Spine and checkpoint value types.

use super::XmlParser;
use crate::dom::NodeId;
use crate::parser::states::StateKind;

/// Public view of one frame on the spine.
///
/// Read bottom-to-top a spine is the ancestor chain at the parser's
/// position: document, then every open construct, innermost last. Entries
/// expose the construct start, the extent of whatever token is currently
/// accumulating, and enough sub-phase information for completion
/// classification without leaking frame internals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpineEntry {
    pub kind: StateKind,
    /// Offset where the construct began (`<`, `&`, quote, name start).
    pub start: usize,
    /// Offset where the accumulating token began; equals `start` when the
    /// state has no inner token.
    pub token_start: usize,
    /// Bytes accumulated in the current token so far.
    pub token_len: usize,
    /// Attribute-value delimiter; `None` for the unquoted error form and
    /// for every non-value state.
    pub delimiter: Option<char>,
    /// For `TagStart`: whether `!` has been consumed (the frame is deciding
    /// between comment, CDATA section and doctype).
    pub declaration: bool,
    /// For `Element`: whether the parser is still inside the open tag's
    /// markup rather than the element content.
    pub in_tag: bool,
    /// The node this frame is building; `None` in spine-only mode and for
    /// states that build no node of their own.
    pub node: Option<NodeId>,
}

impl SpineEntry {
    /// A lone `<` with nothing decided yet.
    pub fn is_bare_tag_open(&self) -> bool {
        self.kind == StateKind::TagStart && !self.declaration && self.token_len == 0
    }
}

/// Ancestor chain at a parser position, bottom (document) to top
/// (innermost).
#[derive(Clone, Debug)]
pub struct Spine {
    pub(crate) entries: Vec<SpineEntry>,
    pub(crate) position: usize,
}

impl Spine {
    /// Parser position this spine was captured at.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn entries(&self) -> &[SpineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The innermost active state.
    pub fn innermost(&self) -> &SpineEntry {
        self.entries.last().expect("spine always has a document entry")
    }

    /// The innermost state's parent, when the spine is deeper than the
    /// document root.
    pub fn parent_of_innermost(&self) -> Option<&SpineEntry> {
        self.entries.len().checked_sub(2).map(|i| &self.entries[i])
    }
}

/// Immutable snapshot of a parser's entire mutable state.
///
/// Cloning a checkpoint (or resuming from one several times) forks the
/// parse: every resumed parser continues independently and identically to
/// one that replayed the original pushes from the start. In spine-only mode
/// the snapshot is just the frame stack and diagnostics, which keeps
/// per-keystroke forks cheap.
///
/// A checkpoint is only meaningful against text whose prefix up to
/// `position()` is unchanged since the capture; resuming against anything
/// else is a caller contract violation.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    pub(crate) inner: XmlParser,
}

impl Checkpoint {
    /// Offset the captured parser had consumed up to.
    pub fn position(&self) -> usize {
        self.inner.position()
    }

    /// Whether the captured parser was building a tree.
    pub fn is_tree_building(&self) -> bool {
        self.inner.is_tree_building()
    }
}
