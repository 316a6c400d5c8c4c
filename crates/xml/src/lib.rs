//! Incremental, error-tolerant XML parsing engine.
//!
//! Built for editors: input is almost always syntactically broken while it
//! is being typed, so the parser never fails. Every problem becomes a
//! diagnostic and every parse produces a best-effort tree. The state stack
//! (the "spine") can be snapshotted, forked and resumed, which makes "what
//! is the syntactic context at offset N" a cheap question to answer after
//! every keystroke.

pub mod dom;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
mod parser;
mod shared;

pub use crate::dom::{
    AttributeData, ClosingTagData, DocTypeData, Document, ElementData, NodeData, NodeId,
    NodeKind, ProcessingInstructionData, XmlName,
};
pub use crate::parser::{
    Checkpoint, ParserStats, Spine, SpineEntry, StateKind, XmlParser, is_name_char,
    is_name_start_char, is_xml_whitespace,
};
pub use crate::shared::{
    CancelToken, DEFAULT_READAHEAD, Diagnostic, DiagnosticCode, DiagnosticDescriptor, Severity,
    TextSource, TextSpan,
};
