//! Incremental XML parser: the spine driver.
//!
//! The parser is an explicit state machine driven one character at a time.
//! Live states form a stack (the "spine"); read bottom-to-top the spine is
//! the ancestor chain at the current position. The same machine runs in two
//! modes: spine-only (states, no nodes; cheap and disposable) and
//! tree-building (also constructs the arena document).
//!
//! Invariants:
//! - `push` never panics on malformed input; problems become diagnostics.
//!   Panics are reserved for API-contract violations (pushing after
//!   `finish`, tree operations on a spine-only parser).
//! - Split-equivalence: pushing `T[0..k)`, checkpointing, and resuming with
//!   `T[k..n)` yields the same final state and tree as pushing `T[0..n)` in
//!   one pass, for every split point k.
//! - Spans are monotonic: a node's span start never moves and its extent
//!   never shrinks; sealing fixes the end once.

use crate::dom::{
    AttributeData, ClosingTagData, DocTypeData, Document, ElementData, NodeId, NodeKind,
    ProcessingInstructionData, XmlName,
};
use crate::shared::{CancelToken, Diagnostic, DiagnosticCode, TextSource, TextSpan};

use states::{
    DocTypeKeyword, Frame, attribute_phase, closing_phase, doctype_phase, element_phase,
    pi_phase, tag_phase,
};

mod spine;
mod states;

pub use spine::{Checkpoint, Spine, SpineEntry};
pub use states::{StateKind, is_name_char, is_name_start_char, is_xml_whitespace};

/// Parser instrumentation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub pushes: u64,
    pub state_transitions: u64,
    pub nodes_created: u64,
    pub diagnostics_emitted: u64,
}

/// One step of the dispatcher: either the character was consumed, or it must
/// be re-dispatched against the new top of the spine (recovery rule (a):
/// treat the character as whatever it would begin in the parent context).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Consumed,
    Reprocess,
}

/// Character-at-a-time XML parser with a forkable spine.
#[derive(Clone, Debug)]
pub struct XmlParser {
    tree: bool,
    pos: usize,
    frames: Vec<Frame>,
    doc: Document,
    diagnostics: Vec<Diagnostic>,
    open_text: Option<NodeId>,
    stats: ParserStats,
    finished: bool,
}

impl XmlParser {
    /// Parser that tracks only the spine. No nodes are built; checkpoints
    /// clone just the frame stack, so per-keystroke forks stay cheap.
    pub fn spine_only() -> Self {
        Self::new(false)
    }

    /// Parser that builds the full node tree alongside the spine.
    pub fn tree_builder() -> Self {
        Self::new(true)
    }

    fn new(tree: bool) -> Self {
        Self {
            tree,
            pos: 0,
            frames: vec![Frame::Document],
            doc: Document::new(),
            diagnostics: Vec::new(),
            open_text: None,
            stats: ParserStats::default(),
            finished: false,
        }
    }

    /// Parse `text` into a document in one pass.
    pub fn parse(text: &str) -> Document {
        let mut parser = XmlParser::tree_builder();
        for ch in text.chars() {
            parser.push(ch);
        }
        parser.into_document()
    }

    /// Spine at `offset` obtained by a fresh spine-only pass over
    /// `text[..offset]`.
    ///
    /// `offset` must lie on a char boundary of `text`; anything else is a
    /// caller error.
    pub fn spine_at(text: &str, offset: usize) -> Spine {
        let mut parser = XmlParser::spine_only();
        for ch in text[..offset].chars() {
            parser.push(ch);
        }
        parser.spine()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_tree_building(&self) -> bool {
        self.tree
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Diagnostics collected so far, in parse order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Snapshot the parser's entire mutable state as an immutable value.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            inner: self.clone(),
        }
    }

    /// Resume pushing from a checkpoint.
    ///
    /// The checkpoint can be resumed any number of times; each resume is an
    /// independent fork. The caller must only resume against text whose
    /// prefix up to `checkpoint.position()` matches the captured parse.
    pub fn resume(checkpoint: &Checkpoint) -> XmlParser {
        checkpoint.inner.clone()
    }

    /// Current ancestor chain, bottom (document) to top (innermost). O(depth).
    pub fn spine(&self) -> Spine {
        let entries = self
            .frames
            .iter()
            .map(|frame| self.spine_entry(frame))
            .collect();
        Spine {
            entries,
            position: self.pos,
        }
    }

    /// Advance by exactly one character.
    pub fn push(&mut self, ch: char) {
        assert!(!self.finished, "XmlParser::push called after finish()");
        self.stats.pushes = self.stats.pushes.saturating_add(1);
        // A character may be re-dispatched while recovery pops frames, but
        // every hop either pops a frame or advances a sub-phase; a budget
        // failure here is an engine bug, not bad input.
        let mut hops = self.frames.len() + 16;
        loop {
            match self.step(ch) {
                Step::Consumed => break,
                Step::Reprocess => {
                    hops -= 1;
                    assert!(
                        hops > 0,
                        "re-dispatch budget exhausted at {} on {:?}",
                        self.pos,
                        ch
                    );
                }
            }
        }
        self.pos += ch.len_utf8();
    }

    /// Signal end of input: every open state is force-closed back to the
    /// root, raising its truncation diagnostic.
    pub fn finish(&mut self) {
        assert!(!self.finished, "XmlParser::finish called twice");
        self.seal_text();
        while self.frames.len() > 1 {
            let frame = self.pop_frame();
            self.close_at_eof(frame);
        }
        if self.tree {
            self.doc.seal(NodeId::DOCUMENT, self.pos);
        }
        self.finished = true;
    }

    /// Finish (if needed) and hand out the built document with its
    /// diagnostics. Tree-building parsers only.
    pub fn into_document(mut self) -> Document {
        assert!(
            self.tree,
            "into_document requires a tree-building parser"
        );
        if !self.finished {
            self.finish();
        }
        let diagnostics = std::mem::take(&mut self.diagnostics);
        self.doc.set_diagnostics(diagnostics);
        self.doc
    }

    /// Bounded lookahead: keep pushing characters read from `source` at the
    /// current position until `target` seals, the character budget runs
    /// out, the source ends, or `cancel` fires.
    ///
    /// Returns `false` (not an error) when the node did not seal. The
    /// cancellation signal is checked between characters, never inside a
    /// single `push`.
    pub fn advance_until_closed<S: TextSource + ?Sized>(
        &mut self,
        target: NodeId,
        source: &S,
        max_chars: usize,
        cancel: &CancelToken,
    ) -> bool {
        assert!(
            self.tree,
            "advance_until_closed requires a tree-building parser"
        );
        let mut budget = max_chars;
        while !self.doc.node(target).is_sealed() {
            if budget == 0 || cancel.is_cancelled() {
                return false;
            }
            let Some(ch) = source.char_at(self.pos) else {
                return false;
            };
            budget -= 1;
            self.push(ch);
        }
        true
    }

    /// The built document so far. Tree-building parsers only; the tree is
    /// only fully sealed after `finish`.
    pub fn document(&self) -> &Document {
        assert!(self.tree, "document requires a tree-building parser");
        &self.doc
    }

    // ----- dispatcher -------------------------------------------------

    fn step(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        match self.frames[top].kind() {
            StateKind::Document => self.step_content(ch),
            StateKind::TagStart => self.step_tag_start(ch),
            StateKind::ElementName => self.step_element_name(ch),
            StateKind::Element => self.step_element(ch),
            StateKind::AttributeName => self.step_attribute_name(ch),
            StateKind::Attribute => self.step_attribute(ch),
            StateKind::AttributeValue => self.step_attribute_value(ch),
            StateKind::ClosingTag => self.step_closing_tag(ch),
            StateKind::Comment => self.step_comment(ch),
            StateKind::CData => self.step_cdata(ch),
            StateKind::DocType => self.step_doctype(ch),
            StateKind::ProcessingInstruction => self.step_processing_instruction(ch),
            StateKind::EntityReference => self.step_entity_reference(ch),
        }
    }

    /// Free text, both at document level and inside an open element.
    fn step_content(&mut self, ch: char) -> Step {
        match ch {
            '<' => {
                self.seal_text();
                self.push_frame(Frame::TagStart {
                    start: self.pos,
                    phase: tag_phase::OPEN,
                });
                Step::Consumed
            }
            '&' => {
                self.ensure_text();
                self.push_frame(Frame::EntityReference {
                    start: self.pos,
                    buf: String::new(),
                });
                Step::Consumed
            }
            _ => {
                self.ensure_text();
                Step::Consumed
            }
        }
    }

    fn step_tag_start(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (start, phase) = match &self.frames[top] {
            Frame::TagStart { start, phase } => (*start, *phase),
            _ => unreachable!("step_tag_start on non-TagStart frame"),
        };
        match phase {
            tag_phase::OPEN => match ch {
                '/' => {
                    self.pop_frame();
                    let node = self.create_closing_tag_node(start);
                    self.push_frame(Frame::ClosingTag {
                        node,
                        start,
                        name_start: 0,
                        buf: String::new(),
                        phase: closing_phase::NAME_EXPECTED,
                    });
                    Step::Consumed
                }
                '?' => {
                    self.pop_frame();
                    let node = self.create_content_node(
                        NodeKind::ProcessingInstruction(ProcessingInstructionData::default()),
                        start,
                    );
                    self.push_frame(Frame::ProcessingInstruction {
                        node,
                        start,
                        phase: pi_phase::TARGET_EXPECTED,
                        buf: String::new(),
                    });
                    Step::Consumed
                }
                '!' => {
                    self.set_tag_phase(top, tag_phase::BANG);
                    Step::Consumed
                }
                '>' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::UnnamedTag,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.record_unnamed_element(start, self.pos + 1);
                    self.pop_frame();
                    Step::Consumed
                }
                c if is_name_start_char(c) => {
                    self.pop_frame();
                    self.begin_element(start);
                    Step::Reprocess
                }
                '<' => {
                    // Resynchronize: the stray `<` never became a tag; the
                    // new one re-dispatches in the parent context.
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, 1),
                        "<",
                    ));
                    self.pop_frame();
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    self.set_tag_phase(top, tag_phase::NAME_PENDING);
                    Step::Consumed
                }
            },
            tag_phase::BANG => match ch {
                '-' => {
                    self.set_tag_phase(top, tag_phase::BANG_DASH);
                    Step::Consumed
                }
                '[' => {
                    self.set_tag_phase(top, tag_phase::CDATA_BASE);
                    Step::Consumed
                }
                'D' => {
                    self.set_tag_phase(top, tag_phase::DOCTYPE_BASE);
                    Step::Consumed
                }
                '>' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::InvalidDeclaration,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.pop_frame();
                    Step::Consumed
                }
                _ => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::InvalidDeclaration,
                        TextSpan::from_bounds(start, self.pos + ch.len_utf8()),
                    ));
                    self.set_tag_phase(top, tag_phase::BOGUS);
                    Step::Consumed
                }
            },
            tag_phase::BANG_DASH => match ch {
                '-' => {
                    self.pop_frame();
                    let node = self.create_content_node(NodeKind::Comment, start);
                    self.push_frame(Frame::Comment {
                        node,
                        start,
                        dashes: 0,
                    });
                    Step::Consumed
                }
                '>' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::InvalidDeclaration,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.pop_frame();
                    Step::Consumed
                }
                _ => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::InvalidDeclaration,
                        TextSpan::from_bounds(start, self.pos + ch.len_utf8()),
                    ));
                    self.set_tag_phase(top, tag_phase::BOGUS);
                    Step::Consumed
                }
            },
            p if (tag_phase::CDATA_BASE..tag_phase::CDATA_BASE + 6).contains(&p) => {
                let expected = b"CDATA["[(p - tag_phase::CDATA_BASE) as usize] as char;
                if ch == expected {
                    if expected == '[' {
                        self.pop_frame();
                        let node = self.create_content_node(NodeKind::CData, start);
                        self.push_frame(Frame::CData {
                            node,
                            start,
                            brackets: 0,
                        });
                    } else {
                        self.set_tag_phase(top, p + 1);
                    }
                    Step::Consumed
                } else {
                    self.bogus_declaration(top, start, ch)
                }
            }
            p if (tag_phase::DOCTYPE_BASE..tag_phase::DOCTYPE_BASE + 6).contains(&p) => {
                let expected = b"OCTYPE"[(p - tag_phase::DOCTYPE_BASE) as usize] as char;
                if ch == expected {
                    if expected == 'E' {
                        self.pop_frame();
                        let node =
                            self.create_content_node(NodeKind::DocType(DocTypeData::default()), start);
                        self.push_frame(Frame::DocType {
                            node,
                            start,
                            phase: doctype_phase::BEFORE_NAME,
                            keyword: DocTypeKeyword::None,
                            literals: 0,
                            token_start: 0,
                            delimiter: '"',
                            subset_depth: 0,
                            subset_start: 0,
                            buf: String::new(),
                        });
                    } else {
                        self.set_tag_phase(top, p + 1);
                    }
                    Step::Consumed
                } else {
                    self.bogus_declaration(top, start, ch)
                }
            }
            tag_phase::BOGUS => match ch {
                '>' => {
                    self.pop_frame();
                    Step::Consumed
                }
                '<' => {
                    self.pop_frame();
                    Step::Reprocess
                }
                _ => Step::Consumed,
            },
            tag_phase::NAME_PENDING => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                c if is_name_start_char(c) => {
                    self.pop_frame();
                    self.begin_element(start);
                    Step::Reprocess
                }
                '>' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::UnnamedTag,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.record_unnamed_element(start, self.pos + 1);
                    self.pop_frame();
                    Step::Consumed
                }
                '<' => {
                    // Resynchronize on the next tag; the entering diagnostic
                    // already covered this region.
                    self.pop_frame();
                    Step::Reprocess
                }
                _ => Step::Consumed,
            },
            _ => unreachable!("unknown TagStart phase {phase}"),
        }
    }

    fn bogus_declaration(&mut self, top: usize, start: usize, ch: char) -> Step {
        self.emit(Diagnostic::new(
            DiagnosticCode::InvalidDeclaration,
            TextSpan::from_bounds(start, self.pos + ch.len_utf8()),
        ));
        if ch == '>' {
            self.pop_frame();
        } else if ch == '<' {
            self.pop_frame();
            return Step::Reprocess;
        } else {
            self.set_tag_phase(top, tag_phase::BOGUS);
        }
        Step::Consumed
    }

    fn step_element_name(&mut self, ch: char) -> Step {
        if is_name_char(ch) {
            let top = self.frames.len() - 1;
            if let Frame::ElementName { buf, .. } = &mut self.frames[top] {
                buf.push(ch);
            }
            return Step::Consumed;
        }
        // Name ends without error on the first non-name character; the
        // parent tag state decides what it means.
        let Frame::ElementName { start, buf } = self.pop_frame() else {
            unreachable!("step_element_name on non-ElementName frame");
        };
        let len = buf.len();
        let name = XmlName::new(buf, TextSpan::new(start, len));
        self.check_name_shape(&name);
        let top = self.frames.len() - 1;
        if let Frame::Element { node, name: slot, .. } = &mut self.frames[top] {
            *slot = name.value.clone();
            if let Some(id) = *node
                && let NodeKind::Element(data) = self.doc.kind_mut(id)
            {
                data.name = Some(name);
                data.is_complete = true;
            }
        }
        Step::Reprocess
    }

    fn step_element(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, phase) = match &self.frames[top] {
            Frame::Element { node, phase, .. } => (*node, *phase),
            _ => unreachable!("step_element on non-Element frame"),
        };
        match phase {
            element_phase::ATTR_SPACE => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                '>' => {
                    self.set_element_phase(top, element_phase::CONTENT);
                    Step::Consumed
                }
                '/' => {
                    self.set_element_phase(top, element_phase::SELF_CLOSE);
                    Step::Consumed
                }
                c if is_name_start_char(c) => {
                    self.begin_attribute(node);
                    Step::Reprocess
                }
                '<' => {
                    let name = self.element_frame_name(top);
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::TagNotClosed,
                        TextSpan::new(self.pos, 1),
                        name,
                    ));
                    self.set_element_phase(top, element_phase::CONTENT);
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    Step::Consumed
                }
            },
            element_phase::SELF_CLOSE => match ch {
                '>' => {
                    if let Some(id) = node {
                        if let NodeKind::Element(data) = self.doc.kind_mut(id) {
                            data.is_self_closing = true;
                            data.is_ended = true;
                        }
                        self.doc.seal(id, self.pos + 1);
                    }
                    self.pop_frame();
                    Step::Consumed
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    self.set_element_phase(top, element_phase::ATTR_SPACE);
                    Step::Reprocess
                }
            },
            element_phase::CONTENT => self.step_content(ch),
            _ => unreachable!("unknown Element phase {phase}"),
        }
    }

    fn step_attribute_name(&mut self, ch: char) -> Step {
        if is_name_char(ch) {
            let top = self.frames.len() - 1;
            if let Frame::AttributeName { buf, .. } = &mut self.frames[top] {
                buf.push(ch);
            }
            return Step::Consumed;
        }
        let Frame::AttributeName { start, buf } = self.pop_frame() else {
            unreachable!("step_attribute_name on non-AttributeName frame");
        };
        let len = buf.len();
        let name = XmlName::new(buf, TextSpan::new(start, len));
        self.check_name_shape(&name);
        self.check_duplicate_attribute(&name);
        let top = self.frames.len() - 1;
        if let Frame::Attribute { node, name: slot, .. } = &mut self.frames[top] {
            *slot = name.value.clone();
            if let Some(id) = *node
                && let NodeKind::Attribute(data) = self.doc.kind_mut(id)
            {
                data.name = Some(name);
            }
        }
        Step::Reprocess
    }

    fn step_attribute(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, name, start, phase) = match &self.frames[top] {
            Frame::Attribute {
                node,
                name,
                start,
                phase,
            } => (*node, name.clone(), *start, *phase),
            _ => unreachable!("step_attribute on non-Attribute frame"),
        };
        match phase {
            attribute_phase::AFTER_NAME => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                '=' => {
                    self.set_attribute_phase(top, attribute_phase::EQUALS_SEEN);
                    Step::Consumed
                }
                c if c == '>' || c == '/' || c == '<' || is_name_start_char(c) => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::AttributeValueExpected,
                        TextSpan::from_bounds(start, self.pos),
                        name,
                    ));
                    self.seal_attribute(node, self.pos, false);
                    self.pop_frame();
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    Step::Consumed
                }
            },
            attribute_phase::EQUALS_SEEN => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                '"' | '\'' => {
                    self.push_frame(Frame::AttributeValue {
                        start: self.pos,
                        value_start: self.pos + 1,
                        delimiter: Some(ch),
                        buf: String::new(),
                    });
                    Step::Consumed
                }
                '>' | '<' | '/' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::IncompleteAttribute,
                        TextSpan::new(self.pos, 1),
                    ));
                    self.seal_attribute(node, self.pos, false);
                    self.pop_frame();
                    Step::Reprocess
                }
                _ => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::UnquotedAttributeValue,
                        TextSpan::new(self.pos, ch.len_utf8()),
                    ));
                    self.push_frame(Frame::AttributeValue {
                        start: self.pos,
                        value_start: self.pos,
                        delimiter: None,
                        buf: String::new(),
                    });
                    Step::Reprocess
                }
            },
            _ => unreachable!("unknown Attribute phase {phase}"),
        }
    }

    fn step_attribute_value(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (value_start, delimiter) = match &self.frames[top] {
            Frame::AttributeValue {
                value_start,
                delimiter,
                ..
            } => (*value_start, *delimiter),
            _ => unreachable!("step_attribute_value on non-AttributeValue frame"),
        };
        match delimiter {
            Some(quote) => match ch {
                c if c == quote => {
                    self.finish_attribute_value(value_start, self.pos, Some(quote), true);
                    Step::Consumed
                }
                '&' => {
                    self.append_value_char(top, '&');
                    self.push_frame(Frame::EntityReference {
                        start: self.pos,
                        buf: String::new(),
                    });
                    Step::Consumed
                }
                '<' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::IncompleteAttribute,
                        TextSpan::new(self.pos, 1),
                    ));
                    self.finish_attribute_value(value_start, self.pos, Some(quote), false);
                    Step::Reprocess
                }
                c => {
                    self.append_value_char(top, c);
                    Step::Consumed
                }
            },
            None => match ch {
                c if is_xml_whitespace(c) => {
                    self.finish_attribute_value(value_start, self.pos, None, true);
                    Step::Consumed
                }
                '>' | '/' | '<' => {
                    self.finish_attribute_value(value_start, self.pos, None, true);
                    Step::Reprocess
                }
                '&' => {
                    self.append_value_char(top, '&');
                    self.push_frame(Frame::EntityReference {
                        start: self.pos,
                        buf: String::new(),
                    });
                    Step::Consumed
                }
                c => {
                    self.append_value_char(top, c);
                    Step::Consumed
                }
            },
        }
    }

    /// Seal the value and its attribute in one go; quoted values consume
    /// their closing quote, every other terminator is left for the parent.
    fn finish_attribute_value(
        &mut self,
        value_start: usize,
        value_end: usize,
        delimiter: Option<char>,
        complete: bool,
    ) {
        let Frame::AttributeValue { buf, .. } = self.pop_frame() else {
            unreachable!("finish_attribute_value on non-AttributeValue frame");
        };
        let attr_end = if complete && delimiter.is_some() {
            value_end + 1
        } else {
            value_end
        };
        let Frame::Attribute { node, .. } = self.pop_frame() else {
            unreachable!("AttributeValue frame must sit on an Attribute frame");
        };
        if let Some(id) = node {
            if let NodeKind::Attribute(data) = self.doc.kind_mut(id) {
                data.value = Some(buf);
                data.value_span = Some(TextSpan::from_bounds(value_start, value_end));
                data.delimiter = delimiter;
                data.is_complete = complete;
            }
            self.doc.seal(id, attr_end);
        }
    }

    fn step_closing_tag(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (start, phase) = match &self.frames[top] {
            Frame::ClosingTag { start, phase, .. } => (*start, *phase),
            _ => unreachable!("step_closing_tag on non-ClosingTag frame"),
        };
        match phase {
            closing_phase::NAME_EXPECTED => match ch {
                c if is_name_start_char(c) => {
                    if let Frame::ClosingTag {
                        name_start,
                        buf,
                        phase,
                        ..
                    } = &mut self.frames[top]
                    {
                        *name_start = self.pos;
                        *phase = closing_phase::NAME;
                        buf.push(c);
                    }
                    Step::Consumed
                }
                '>' => {
                    self.resolve_closing_tag();
                    Step::Consumed
                }
                '<' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::IncompleteClosingTag,
                        TextSpan::from_bounds(start, self.pos),
                    ));
                    self.abandon_closing_tag();
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    Step::Consumed
                }
            },
            closing_phase::NAME => {
                if is_name_char(ch) {
                    if let Frame::ClosingTag { buf, .. } = &mut self.frames[top] {
                        buf.push(ch);
                    }
                    return Step::Consumed;
                }
                let (name_start, name_value) = match &self.frames[top] {
                    Frame::ClosingTag {
                        name_start, buf, ..
                    } => (*name_start, buf.clone()),
                    _ => unreachable!(),
                };
                let name = XmlName::new(
                    name_value,
                    TextSpan::new(name_start, self.pos - name_start),
                );
                self.check_name_shape(&name);
                if let Frame::ClosingTag { node, phase, .. } = &mut self.frames[top] {
                    *phase = closing_phase::AFTER_NAME;
                    if let Some(id) = *node
                        && let NodeKind::ClosingTag(data) = self.doc.kind_mut(id)
                    {
                        data.name = Some(name);
                    }
                }
                Step::Reprocess
            }
            closing_phase::AFTER_NAME => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                '>' => {
                    self.resolve_closing_tag();
                    Step::Consumed
                }
                '<' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::IncompleteClosingTag,
                        TextSpan::from_bounds(start, self.pos),
                    ));
                    self.abandon_closing_tag();
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::UnexpectedCharacterInTag,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    Step::Consumed
                }
            },
            _ => unreachable!("unknown ClosingTag phase {phase}"),
        }
    }

    /// `>` seen: match the closing name against open elements, innermost
    /// outward. A mismatch never closes anything; a match force-closes the
    /// elements nested inside the matched one.
    fn resolve_closing_tag(&mut self) {
        let end = self.pos + 1;
        let Frame::ClosingTag {
            node, start, buf, ..
        } = self.pop_frame()
        else {
            unreachable!("resolve_closing_tag on non-ClosingTag frame");
        };
        let matched = if buf.is_empty() {
            None
        } else {
            self.frames.iter().rposition(
                |frame| matches!(frame, Frame::Element { name, .. } if *name == buf),
            )
        };
        match matched {
            Some(index) => {
                if let Some(id) = node {
                    self.doc.seal(id, end);
                }
                // Unterminated inner elements end where the closing tag
                // begins; they stay !is_ended.
                while self.frames.len() > index + 1 {
                    let Frame::Element {
                        node: inner,
                        name,
                        start: inner_start,
                        ..
                    } = self.pop_frame()
                    else {
                        unreachable!("only element frames sit under a closing tag");
                    };
                    self.emit_unclosed_element(&name, inner_start);
                    if let Some(id) = inner {
                        self.doc.seal(id, start);
                    }
                }
                let Frame::Element {
                    node: element_node, ..
                } = self.pop_frame()
                else {
                    unreachable!("matched frame index must be an element");
                };
                if let Some(element) = element_node {
                    if let NodeKind::Element(data) = self.doc.kind_mut(element) {
                        data.closing_tag = node;
                        data.is_ended = true;
                    }
                    if let Some(id) = node {
                        self.doc.set_parent(id, element);
                    }
                    self.doc.seal(element, end);
                }
            }
            None => {
                let code = if buf.is_empty() {
                    DiagnosticCode::UnnamedClosingTag
                } else {
                    DiagnosticCode::UnmatchedClosingTag
                };
                let mut diagnostic =
                    Diagnostic::new(code, TextSpan::from_bounds(start, end));
                if !buf.is_empty() {
                    diagnostic.args.push(buf);
                }
                self.emit(diagnostic);
                if let Some(id) = node {
                    self.attach_to_container(id);
                    self.doc.seal(id, end);
                }
            }
        }
    }

    /// Closing tag interrupted by `<`: record it unmatched and let the new
    /// tag reprocess in the parent context.
    fn abandon_closing_tag(&mut self) {
        let Frame::ClosingTag { node, .. } = self.pop_frame() else {
            unreachable!("abandon_closing_tag on non-ClosingTag frame");
        };
        if let Some(id) = node {
            self.attach_to_container(id);
            self.doc.seal(id, self.pos);
        }
    }

    fn step_comment(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, dashes) = match &self.frames[top] {
            Frame::Comment { node, dashes, .. } => (*node, *dashes),
            _ => unreachable!("step_comment on non-Comment frame"),
        };
        match ch {
            '-' => {
                // dashes == 3 marks a reported over-long dash run.
                let next = match dashes {
                    0 => 1,
                    1 => 2,
                    2 => {
                        self.emit(Diagnostic::new(
                            DiagnosticCode::IncompleteEndComment,
                            TextSpan::from_bounds(self.pos - 2, self.pos),
                        ));
                        3
                    }
                    _ => 3,
                };
                self.set_comment_dashes(top, next);
                Step::Consumed
            }
            '>' if dashes >= 2 => {
                if let Some(id) = node {
                    self.doc.seal(id, self.pos + 1);
                }
                self.pop_frame();
                Step::Consumed
            }
            _ => {
                if dashes == 2 {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::IncompleteEndComment,
                        TextSpan::from_bounds(self.pos - 2, self.pos),
                    ));
                }
                self.set_comment_dashes(top, 0);
                Step::Consumed
            }
        }
    }

    fn step_cdata(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, brackets) = match &self.frames[top] {
            Frame::CData { node, brackets, .. } => (*node, *brackets),
            _ => unreachable!("step_cdata on non-CData frame"),
        };
        match ch {
            ']' => {
                let next = (brackets + 1).min(2);
                if let Frame::CData { brackets, .. } = &mut self.frames[top] {
                    *brackets = next;
                }
                Step::Consumed
            }
            '>' if brackets == 2 => {
                if let Some(id) = node {
                    self.doc.seal(id, self.pos + 1);
                }
                self.pop_frame();
                Step::Consumed
            }
            _ => {
                if let Frame::CData { brackets, .. } = &mut self.frames[top] {
                    *brackets = 0;
                }
                Step::Consumed
            }
        }
    }

    fn step_doctype(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, start, phase) = match &self.frames[top] {
            Frame::DocType {
                node, start, phase, ..
            } => (*node, *start, *phase),
            _ => unreachable!("step_doctype on non-DocType frame"),
        };
        match phase {
            doctype_phase::BEFORE_NAME => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                c if is_name_start_char(c) => {
                    if let Frame::DocType {
                        phase, token_start, buf, ..
                    } = &mut self.frames[top]
                    {
                        *phase = doctype_phase::NAME;
                        *token_start = self.pos;
                        buf.push(c);
                    }
                    Step::Consumed
                }
                '[' => {
                    self.enter_doctype_subset(top);
                    Step::Consumed
                }
                '>' => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::InvalidDocType,
                        TextSpan::new(self.pos, 1),
                        ">",
                    ));
                    self.seal_doctype(node, self.pos + 1);
                    Step::Consumed
                }
                '<' => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::InvalidDocType,
                        TextSpan::new(self.pos, 1),
                        "<",
                    ));
                    self.seal_doctype(node, self.pos);
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::InvalidDocType,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    self.set_doctype_phase(top, doctype_phase::BOGUS);
                    Step::Consumed
                }
            },
            doctype_phase::NAME => {
                if is_name_char(ch) {
                    if let Frame::DocType { buf, .. } = &mut self.frames[top] {
                        buf.push(ch);
                    }
                    return Step::Consumed;
                }
                let (token_start, value) = match &mut self.frames[top] {
                    Frame::DocType {
                        token_start, buf, phase, ..
                    } => {
                        *phase = doctype_phase::SCAN;
                        (*token_start, std::mem::take(buf))
                    }
                    _ => unreachable!(),
                };
                let name = XmlName::new(value, TextSpan::new(token_start, self.pos - token_start));
                if let Some(id) = node
                    && let NodeKind::DocType(data) = self.doc.kind_mut(id)
                {
                    data.name = Some(name);
                }
                Step::Reprocess
            }
            doctype_phase::SCAN => match ch {
                c if is_xml_whitespace(c) => Step::Consumed,
                c if c.is_ascii_alphabetic() => {
                    if let Frame::DocType {
                        phase, token_start, buf, ..
                    } = &mut self.frames[top]
                    {
                        *phase = doctype_phase::KEYWORD;
                        *token_start = self.pos;
                        buf.push(c);
                    }
                    Step::Consumed
                }
                '"' | '\'' => {
                    if let Frame::DocType {
                        phase,
                        token_start,
                        delimiter,
                        ..
                    } = &mut self.frames[top]
                    {
                        *phase = doctype_phase::LITERAL;
                        *token_start = self.pos;
                        *delimiter = ch;
                    }
                    Step::Consumed
                }
                '[' => {
                    self.enter_doctype_subset(top);
                    Step::Consumed
                }
                '>' => {
                    self.seal_doctype(node, self.pos + 1);
                    Step::Consumed
                }
                '<' => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::InvalidDocType,
                        TextSpan::new(self.pos, 1),
                        "<",
                    ));
                    self.seal_doctype(node, self.pos);
                    Step::Reprocess
                }
                c => {
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::InvalidDocType,
                        TextSpan::new(self.pos, c.len_utf8()),
                        c.to_string(),
                    ));
                    self.set_doctype_phase(top, doctype_phase::BOGUS);
                    Step::Consumed
                }
            },
            doctype_phase::KEYWORD => {
                if ch.is_ascii_alphabetic() {
                    if let Frame::DocType { buf, .. } = &mut self.frames[top] {
                        buf.push(ch);
                    }
                    return Step::Consumed;
                }
                let keyword = match &mut self.frames[top] {
                    Frame::DocType { buf, phase, .. } => {
                        *phase = doctype_phase::SCAN;
                        std::mem::take(buf)
                    }
                    _ => unreachable!(),
                };
                let recognized = match keyword.as_str() {
                    "PUBLIC" => Some(DocTypeKeyword::Public),
                    "SYSTEM" => Some(DocTypeKeyword::System),
                    _ => None,
                };
                match recognized {
                    Some(kw) => {
                        if let Frame::DocType { keyword, .. } = &mut self.frames[top] {
                            *keyword = kw;
                        }
                    }
                    None => {
                        let token_start = match &self.frames[top] {
                            Frame::DocType { token_start, .. } => *token_start,
                            _ => unreachable!(),
                        };
                        self.emit(Diagnostic::with_arg(
                            DiagnosticCode::InvalidDocType,
                            TextSpan::from_bounds(token_start, self.pos),
                            keyword,
                        ));
                    }
                }
                Step::Reprocess
            }
            doctype_phase::LITERAL => {
                let (token_start, delimiter, keyword, literals) = match &self.frames[top] {
                    Frame::DocType {
                        token_start,
                        delimiter,
                        keyword,
                        literals,
                        ..
                    } => (*token_start, *delimiter, *keyword, *literals),
                    _ => unreachable!(),
                };
                if ch != delimiter {
                    return Step::Consumed;
                }
                let literal = TextSpan::from_bounds(token_start + 1, self.pos);
                if let Some(id) = node
                    && let NodeKind::DocType(data) = self.doc.kind_mut(id)
                {
                    match (keyword, literals) {
                        (DocTypeKeyword::Public, 0) => data.public_id_span = Some(literal),
                        (DocTypeKeyword::Public, 1) | (DocTypeKeyword::System, 0) => {
                            data.system_id_span = Some(literal)
                        }
                        _ => {}
                    }
                }
                if let Frame::DocType { literals, phase, .. } = &mut self.frames[top] {
                    *literals = literals.saturating_add(1);
                    *phase = doctype_phase::SCAN;
                }
                Step::Consumed
            }
            doctype_phase::SUBSET => match ch {
                '[' => {
                    if let Frame::DocType { subset_depth, .. } = &mut self.frames[top] {
                        *subset_depth = subset_depth.saturating_add(1);
                    }
                    Step::Consumed
                }
                ']' => {
                    let closed = match &mut self.frames[top] {
                        Frame::DocType { subset_depth, .. } => {
                            *subset_depth -= 1;
                            *subset_depth == 0
                        }
                        _ => unreachable!(),
                    };
                    if closed {
                        let subset_start = match &self.frames[top] {
                            Frame::DocType { subset_start, .. } => *subset_start,
                            _ => unreachable!(),
                        };
                        let subset = TextSpan::from_bounds(subset_start, self.pos + 1);
                        if let Some(id) = node
                            && let NodeKind::DocType(data) = self.doc.kind_mut(id)
                        {
                            data.internal_subset_span = Some(subset);
                        }
                        self.set_doctype_phase(top, doctype_phase::SCAN);
                    }
                    Step::Consumed
                }
                _ => Step::Consumed,
            },
            doctype_phase::BOGUS => match ch {
                '>' => {
                    self.seal_doctype(node, self.pos + 1);
                    Step::Consumed
                }
                '<' => {
                    self.seal_doctype(node, self.pos);
                    Step::Reprocess
                }
                _ => Step::Consumed,
            },
            _ => unreachable!("unknown DocType phase {phase}"),
        }
    }

    fn enter_doctype_subset(&mut self, top: usize) {
        if let Frame::DocType {
            phase,
            subset_depth,
            subset_start,
            ..
        } = &mut self.frames[top]
        {
            *phase = doctype_phase::SUBSET;
            *subset_depth = 1;
            *subset_start = self.pos;
        }
    }

    fn seal_doctype(&mut self, node: Option<NodeId>, end: usize) {
        if let Some(id) = node {
            self.doc.seal(id, end);
        }
        self.pop_frame();
    }

    fn step_processing_instruction(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (node, start, phase) = match &self.frames[top] {
            Frame::ProcessingInstruction {
                node, start, phase, ..
            } => (*node, *start, *phase),
            _ => unreachable!("step_processing_instruction on non-PI frame"),
        };
        match phase {
            pi_phase::TARGET_EXPECTED => match ch {
                c if is_name_start_char(c) => {
                    if let Frame::ProcessingInstruction { phase, buf, .. } =
                        &mut self.frames[top]
                    {
                        *phase = pi_phase::TARGET;
                        buf.push(c);
                    }
                    Step::Consumed
                }
                '?' => {
                    self.set_pi_phase(top, pi_phase::QUESTION);
                    Step::Consumed
                }
                '>' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::UnnamedProcessingInstruction,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.seal_pi(node, self.pos + 1);
                    Step::Consumed
                }
                _ => {
                    self.set_pi_phase(top, pi_phase::BODY);
                    Step::Consumed
                }
            },
            pi_phase::TARGET => {
                if is_name_char(ch) {
                    if let Frame::ProcessingInstruction { buf, .. } = &mut self.frames[top] {
                        buf.push(ch);
                    }
                    return Step::Consumed;
                }
                self.finalize_pi_target(top, start, node);
                let next = if ch == '?' {
                    pi_phase::QUESTION
                } else {
                    pi_phase::BODY
                };
                self.set_pi_phase(top, next);
                Step::Consumed
            }
            pi_phase::BODY => {
                if ch == '?' {
                    self.set_pi_phase(top, pi_phase::QUESTION);
                }
                Step::Consumed
            }
            pi_phase::QUESTION => match ch {
                '>' => {
                    let unnamed = match &self.frames[top] {
                        Frame::ProcessingInstruction { buf, .. } => buf.is_empty(),
                        _ => unreachable!(),
                    };
                    if unnamed {
                        self.emit(Diagnostic::new(
                            DiagnosticCode::UnnamedProcessingInstruction,
                            TextSpan::from_bounds(start, self.pos + 1),
                        ));
                    }
                    self.seal_pi(node, self.pos + 1);
                    Step::Consumed
                }
                '?' => Step::Consumed,
                _ => {
                    self.set_pi_phase(top, pi_phase::BODY);
                    Step::Consumed
                }
            },
            _ => unreachable!("unknown ProcessingInstruction phase {phase}"),
        }
    }

    fn finalize_pi_target(&mut self, top: usize, start: usize, node: Option<NodeId>) {
        let value = match &mut self.frames[top] {
            Frame::ProcessingInstruction { buf, .. } => buf.clone(),
            _ => unreachable!(),
        };
        // Target begins right after `<?`.
        let name = XmlName::new(value, TextSpan::new(start + 2, self.pos - (start + 2)));
        if let Some(id) = node
            && let NodeKind::ProcessingInstruction(data) = self.doc.kind_mut(id)
        {
            data.name = Some(name);
        }
    }

    fn seal_pi(&mut self, node: Option<NodeId>, end: usize) {
        if let Some(id) = node {
            self.doc.seal(id, end);
        }
        self.pop_frame();
    }

    fn step_entity_reference(&mut self, ch: char) -> Step {
        let top = self.frames.len() - 1;
        let (start, empty) = match &self.frames[top] {
            Frame::EntityReference { start, buf } => (*start, buf.is_empty()),
            _ => unreachable!("step_entity_reference on non-EntityReference frame"),
        };
        if empty {
            match ch {
                c if c == '#' || is_name_start_char(c) => {
                    if let Frame::EntityReference { buf, .. } = &mut self.frames[top] {
                        buf.push(c);
                    }
                    self.append_value_char(top - 1, c);
                    Step::Consumed
                }
                ';' => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::EntityNameExpected,
                        TextSpan::from_bounds(start, self.pos + 1),
                    ));
                    self.pop_frame();
                    self.append_value_char(self.frames.len() - 1, ';');
                    Step::Consumed
                }
                _ => {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::EntityNameExpected,
                        TextSpan::from_bounds(start, self.pos),
                    ));
                    self.pop_frame();
                    Step::Reprocess
                }
            }
        } else {
            match ch {
                c if is_name_char(c) => {
                    if let Frame::EntityReference { buf, .. } = &mut self.frames[top] {
                        buf.push(c);
                    }
                    self.append_value_char(top - 1, c);
                    Step::Consumed
                }
                ';' => {
                    self.pop_frame();
                    self.append_value_char(self.frames.len() - 1, ';');
                    Step::Consumed
                }
                _ => {
                    let buf = match &self.frames[top] {
                        Frame::EntityReference { buf, .. } => buf.clone(),
                        _ => unreachable!(),
                    };
                    self.emit(Diagnostic::with_arg(
                        DiagnosticCode::IncompleteEntity,
                        TextSpan::from_bounds(start, self.pos),
                        buf,
                    ));
                    self.pop_frame();
                    Step::Reprocess
                }
            }
        }
    }

    // ----- EOF --------------------------------------------------------

    fn close_at_eof(&mut self, frame: Frame) {
        let pos = self.pos;
        match frame {
            Frame::Document => unreachable!("document frame is never popped"),
            Frame::TagStart { start, .. } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::TagEof,
                    TextSpan::from_bounds(start, pos),
                ));
            }
            Frame::ElementName { start, buf } => {
                // The name itself parsed fine; the enclosing tag frame
                // reports the truncation.
                let name = XmlName::new(buf, TextSpan::from_bounds(start, pos));
                self.check_name_shape(&name);
                let top = self.frames.len() - 1;
                if let Frame::Element { node, name: slot, .. } = &mut self.frames[top] {
                    *slot = name.value.clone();
                    if let Some(id) = *node
                        && let NodeKind::Element(data) = self.doc.kind_mut(id)
                    {
                        data.name = Some(name);
                        data.is_complete = true;
                    }
                }
            }
            Frame::Element {
                node, name, start, phase,
            } => {
                if phase == element_phase::CONTENT {
                    self.emit_unclosed_element(&name, start);
                } else {
                    self.emit(Diagnostic::new(
                        DiagnosticCode::TagEof,
                        TextSpan::from_bounds(start, pos),
                    ));
                }
                if let Some(id) = node {
                    self.doc.seal(id, pos);
                }
            }
            Frame::AttributeName { start, buf } => {
                let name = XmlName::new(buf, TextSpan::from_bounds(start, pos));
                self.check_name_shape(&name);
                self.check_duplicate_attribute(&name);
                let top = self.frames.len() - 1;
                if let Frame::Attribute { node, name: slot, .. } = &mut self.frames[top] {
                    *slot = name.value.clone();
                    if let Some(id) = *node
                        && let NodeKind::Attribute(data) = self.doc.kind_mut(id)
                    {
                        data.name = Some(name);
                    }
                }
            }
            Frame::Attribute { node, start, .. } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::AttributeEof,
                    TextSpan::from_bounds(start, pos),
                ));
                self.seal_attribute(node, pos, false);
            }
            Frame::AttributeValue {
                start,
                value_start,
                delimiter,
                buf,
            } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::AttributeValueEof,
                    TextSpan::from_bounds(start, pos),
                ));
                // Seal the attribute frame beneath in the same stroke so the
                // truncation surfaces as a single diagnostic.
                let Frame::Attribute { node, .. } = self.pop_frame() else {
                    unreachable!("AttributeValue frame must sit on an Attribute frame");
                };
                if let Some(id) = node {
                    if let NodeKind::Attribute(data) = self.doc.kind_mut(id) {
                        data.value = Some(buf);
                        data.value_span = Some(TextSpan::from_bounds(value_start, pos));
                        data.delimiter = delimiter;
                        data.is_complete = false;
                    }
                    self.doc.seal(id, pos);
                }
            }
            Frame::ClosingTag {
                node, start, name_start, buf, phase,
            } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::ClosingTagEof,
                    TextSpan::from_bounds(start, pos),
                ));
                if let Some(id) = node {
                    if phase == closing_phase::NAME && !buf.is_empty() {
                        let name =
                            XmlName::new(buf, TextSpan::from_bounds(name_start, pos));
                        if let NodeKind::ClosingTag(data) = self.doc.kind_mut(id) {
                            data.name = Some(name);
                        }
                    }
                    self.attach_to_container(id);
                    self.doc.seal(id, pos);
                }
            }
            Frame::Comment { node, start, .. } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::CommentEof,
                    TextSpan::from_bounds(start, pos),
                ));
                if let Some(id) = node {
                    self.doc.seal(id, pos);
                }
            }
            Frame::CData { node, start, .. } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::CDataEof,
                    TextSpan::from_bounds(start, pos),
                ));
                if let Some(id) = node {
                    self.doc.seal(id, pos);
                }
            }
            Frame::DocType {
                node,
                start,
                phase,
                subset_start,
                ..
            } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::DocTypeEof,
                    TextSpan::from_bounds(start, pos),
                ));
                if let Some(id) = node {
                    if phase == doctype_phase::SUBSET
                        && let NodeKind::DocType(data) = self.doc.kind_mut(id)
                    {
                        data.internal_subset_span =
                            Some(TextSpan::from_bounds(subset_start, pos));
                    }
                    self.doc.seal(id, pos);
                }
            }
            Frame::ProcessingInstruction {
                node, start, phase, buf,
            } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::ProcessingInstructionEof,
                    TextSpan::from_bounds(start, pos),
                ));
                if phase == pi_phase::TARGET
                    && !buf.is_empty()
                    && let Some(id) = node
                    && let NodeKind::ProcessingInstruction(data) = self.doc.kind_mut(id)
                {
                    data.name = Some(XmlName::new(buf, TextSpan::from_bounds(start + 2, pos)));
                }
                if let Some(id) = node {
                    self.doc.seal(id, pos);
                }
            }
            Frame::EntityReference { start, .. } => {
                self.emit(Diagnostic::new(
                    DiagnosticCode::EntityEof,
                    TextSpan::from_bounds(start, pos),
                ));
            }
        }
    }

    // ----- shared helpers ---------------------------------------------

    fn begin_element(&mut self, start: usize) {
        let node = self.create_content_node(NodeKind::Element(ElementData::default()), start);
        self.push_frame(Frame::Element {
            node,
            name: String::new(),
            start,
            phase: element_phase::ATTR_SPACE,
        });
        self.push_frame(Frame::ElementName {
            start: self.pos,
            buf: String::new(),
        });
    }

    fn begin_attribute(&mut self, element: Option<NodeId>) {
        let node = if self.tree {
            let element = element.expect("tree mode element frame carries a node");
            let id = self.doc.push_node(
                NodeKind::Attribute(AttributeData::default()),
                self.pos,
                element,
            );
            self.stats.nodes_created = self.stats.nodes_created.saturating_add(1);
            if let NodeKind::Element(data) = self.doc.kind_mut(element) {
                data.attributes.push(id);
            }
            Some(id)
        } else {
            None
        };
        self.push_frame(Frame::Attribute {
            node,
            name: String::new(),
            start: self.pos,
            phase: attribute_phase::AFTER_NAME,
        });
        self.push_frame(Frame::AttributeName {
            start: self.pos,
            buf: String::new(),
        });
    }

    fn seal_attribute(&mut self, node: Option<NodeId>, end: usize, complete: bool) {
        if let Some(id) = node {
            if let NodeKind::Attribute(data) = self.doc.kind_mut(id) {
                data.is_complete = complete;
            }
            self.doc.seal(id, end);
        }
    }

    /// `<>`-style tag: the element exists in the tree, unnamed and sealed,
    /// but never becomes an ancestor.
    fn record_unnamed_element(&mut self, start: usize, end: usize) {
        if !self.tree {
            return;
        }
        let node = self
            .create_content_node(NodeKind::Element(ElementData::default()), start)
            .expect("tree mode creates nodes");
        if let NodeKind::Element(data) = self.doc.kind_mut(node) {
            data.is_ended = true;
        }
        self.doc.seal(node, end);
    }

    /// Create a node attached as a child of the innermost open container.
    fn create_content_node(&mut self, kind: NodeKind, start: usize) -> Option<NodeId> {
        if !self.tree {
            return None;
        }
        let parent = self.container_node();
        let id = self.doc.push_node(kind, start, parent);
        self.doc.add_child(parent, id);
        self.stats.nodes_created = self.stats.nodes_created.saturating_add(1);
        Some(id)
    }

    /// Create a closing-tag node parented to the container but not yet
    /// recorded anywhere; resolution decides between
    /// `ElementData::closing_tag` and the container's child list.
    fn create_closing_tag_node(&mut self, start: usize) -> Option<NodeId> {
        if !self.tree {
            return None;
        }
        let parent = self.container_node();
        let id = self
            .doc
            .push_node(NodeKind::ClosingTag(ClosingTagData::default()), start, parent);
        self.stats.nodes_created = self.stats.nodes_created.saturating_add(1);
        Some(id)
    }

    fn attach_to_container(&mut self, id: NodeId) {
        let parent = self.container_node();
        self.doc.set_parent(id, parent);
        self.doc.add_child(parent, id);
    }

    /// Innermost open element's node, or the document node.
    fn container_node(&self) -> NodeId {
        for frame in self.frames.iter().rev() {
            if let Frame::Element { node, .. } = frame {
                return node.expect("tree mode element frame carries a node");
            }
        }
        NodeId::DOCUMENT
    }

    fn ensure_text(&mut self) {
        if !self.tree || self.open_text.is_some() {
            return;
        }
        let parent = self.container_node();
        let id = self.doc.push_node(NodeKind::Text, self.pos, parent);
        self.doc.add_child(parent, id);
        self.stats.nodes_created = self.stats.nodes_created.saturating_add(1);
        self.open_text = Some(id);
    }

    fn seal_text(&mut self) {
        if let Some(id) = self.open_text.take() {
            self.doc.seal(id, self.pos);
        }
    }

    /// Append a raw character to the value accumulating in an
    /// `AttributeValue` frame at `index`, when there is one (entity frames
    /// forward their characters so values keep their raw text).
    fn append_value_char(&mut self, index: usize, ch: char) {
        if let Some(Frame::AttributeValue { buf, .. }) = self.frames.get_mut(index) {
            buf.push(ch);
        }
    }

    fn emit_unclosed_element(&mut self, name: &str, start: usize) {
        // Point at the element name inside its open tag.
        let span = TextSpan::new(start + 1, name.len().max(1));
        self.emit(Diagnostic::with_arg(
            DiagnosticCode::UnclosedTag,
            span,
            name.to_string(),
        ));
    }

    /// Name-shape diagnostics need the full token, so they run at seal time
    /// and only while building a tree (the spine-only fast path skips name
    /// analysis by design).
    fn check_name_shape(&mut self, name: &XmlName) {
        if !self.tree {
            return;
        }
        let colons = name.value.matches(':').count();
        if colons > 1 {
            self.emit(Diagnostic::with_arg(
                DiagnosticCode::MultipleNamespaceSeparators,
                name.span,
                name.value.clone(),
            ));
        } else if colons == 1
            && let Some((prefix, local)) = name.value.split_once(':')
            && (prefix.is_empty() || local.is_empty())
        {
            self.emit(Diagnostic::with_arg(
                DiagnosticCode::EmptyNamespace,
                name.span,
                name.value.clone(),
            ));
        }
    }

    /// Duplicate detection runs against the element the attribute frame
    /// hangs off; tree-building mode only.
    fn check_duplicate_attribute(&mut self, name: &XmlName) {
        if !self.tree {
            return;
        }
        let Some(Frame::Attribute {
            node: Some(attr), ..
        }) = self.frames.last()
        else {
            return;
        };
        let attr = *attr;
        let element = self
            .doc
            .node(attr)
            .parent()
            .expect("attribute nodes always have an element parent");
        let Some(data) = self.doc.node(element).as_element() else {
            return;
        };
        let duplicate = data
            .attributes
            .iter()
            .filter(|id| **id != attr)
            .any(|id| {
                self.doc
                    .node(*id)
                    .name()
                    .is_some_and(|existing| existing.value == name.value)
            });
        if duplicate {
            self.emit(Diagnostic::with_arg(
                DiagnosticCode::DuplicateAttribute,
                name.span,
                name.value.clone(),
            ));
        }
    }

    fn element_frame_name(&self, index: usize) -> String {
        match &self.frames[index] {
            Frame::Element { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    // ----- frame plumbing ---------------------------------------------

    fn push_frame(&mut self, frame: Frame) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "xml.parser",
            "push {:?} @{}",
            frame.kind(),
            self.pos
        );
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) -> Frame {
        let frame = self.frames.pop().expect("document frame is never popped");
        debug_assert!(
            !self.frames.is_empty(),
            "popped the document frame"
        );
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "xml.parser",
            "pop {:?} @{}",
            frame.kind(),
            self.pos
        );
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
        frame
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "xml.parser",
            "diagnostic {:?} @{:?}",
            diagnostic.code,
            diagnostic.span
        );
        self.stats.diagnostics_emitted = self.stats.diagnostics_emitted.saturating_add(1);
        self.diagnostics.push(diagnostic);
    }

    fn set_tag_phase(&mut self, index: usize, value: u8) {
        if let Frame::TagStart { phase, .. } = &mut self.frames[index] {
            *phase = value;
        }
    }

    fn set_element_phase(&mut self, index: usize, value: u8) {
        if let Frame::Element { phase, .. } = &mut self.frames[index] {
            *phase = value;
        }
    }

    fn set_attribute_phase(&mut self, index: usize, value: u8) {
        if let Frame::Attribute { phase, .. } = &mut self.frames[index] {
            *phase = value;
        }
    }

    fn set_doctype_phase(&mut self, index: usize, value: u8) {
        if let Frame::DocType { phase, .. } = &mut self.frames[index] {
            *phase = value;
        }
    }

    fn set_pi_phase(&mut self, index: usize, value: u8) {
        if let Frame::ProcessingInstruction { phase, .. } = &mut self.frames[index] {
            *phase = value;
        }
    }

    fn set_comment_dashes(&mut self, index: usize, value: u8) {
        if let Frame::Comment { dashes, .. } = &mut self.frames[index] {
            *dashes = value;
        }
    }

    fn spine_entry(&self, frame: &Frame) -> SpineEntry {
        match frame {
            Frame::Document => SpineEntry {
                kind: StateKind::Document,
                start: 0,
                token_start: 0,
                token_len: 0,
                delimiter: None,
                declaration: false,
                in_tag: false,
                node: self.tree.then_some(NodeId::DOCUMENT),
            },
            Frame::TagStart { start, phase } => SpineEntry {
                kind: StateKind::TagStart,
                start: *start,
                token_start: *start + 1,
                token_len: self.pos - (*start + 1),
                delimiter: None,
                declaration: (tag_phase::BANG..=tag_phase::BOGUS).contains(phase),
                in_tag: false,
                node: None,
            },
            Frame::Element {
                node, name, start, phase,
            } => SpineEntry {
                kind: StateKind::Element,
                start: *start,
                token_start: *start + 1,
                token_len: name.len(),
                delimiter: None,
                declaration: false,
                in_tag: *phase != element_phase::CONTENT,
                node: *node,
            },
            Frame::ElementName { start, buf } => SpineEntry {
                kind: StateKind::ElementName,
                start: *start,
                token_start: *start,
                token_len: buf.len(),
                delimiter: None,
                declaration: false,
                in_tag: true,
                node: None,
            },
            Frame::Attribute { node, name, start, .. } => SpineEntry {
                kind: StateKind::Attribute,
                start: *start,
                token_start: *start,
                token_len: name.len(),
                delimiter: None,
                declaration: false,
                in_tag: true,
                node: *node,
            },
            Frame::AttributeName { start, buf } => SpineEntry {
                kind: StateKind::AttributeName,
                start: *start,
                token_start: *start,
                token_len: buf.len(),
                delimiter: None,
                declaration: false,
                in_tag: true,
                node: None,
            },
            Frame::AttributeValue {
                start,
                value_start,
                delimiter,
                buf,
            } => SpineEntry {
                kind: StateKind::AttributeValue,
                start: *start,
                token_start: *value_start,
                token_len: buf.len(),
                delimiter: *delimiter,
                declaration: false,
                in_tag: true,
                node: None,
            },
            Frame::ClosingTag {
                node, start, name_start, buf, phase,
            } => SpineEntry {
                kind: StateKind::ClosingTag,
                start: *start,
                token_start: if *phase >= closing_phase::NAME {
                    *name_start
                } else {
                    *start + 2
                },
                token_len: buf.len(),
                delimiter: None,
                declaration: false,
                in_tag: false,
                node: *node,
            },
            Frame::Comment { node, start, .. } => self.block_entry(StateKind::Comment, *start, *node),
            Frame::CData { node, start, .. } => self.block_entry(StateKind::CData, *start, *node),
            Frame::DocType { node, start, .. } => self.block_entry(StateKind::DocType, *start, *node),
            Frame::ProcessingInstruction { node, start, .. } => {
                self.block_entry(StateKind::ProcessingInstruction, *start, *node)
            }
            Frame::EntityReference { start, buf } => SpineEntry {
                kind: StateKind::EntityReference,
                start: *start,
                token_start: *start + 1,
                token_len: buf.len(),
                delimiter: None,
                declaration: false,
                in_tag: false,
                node: None,
            },
        }
    }

    fn block_entry(&self, kind: StateKind, start: usize, node: Option<NodeId>) -> SpineEntry {
        SpineEntry {
            kind,
            start,
            token_start: start,
            token_len: self.pos - start,
            delimiter: None,
            declaration: false,
            in_tag: false,
            node,
        }
    }
}
