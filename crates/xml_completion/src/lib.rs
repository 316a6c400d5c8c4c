//! Completion trigger classification.
//!
//! Decides, for a single edit, whether a completion session should open and
//! which text range it owns. Classification runs over a spine (the
//! syntactic context at the cursor); span resolution then performs bounded
//! forward scans over buffer text using fixed token-shape rules, never the
//! parser.
//!
//! The decision table is priority-ordered and first-match-wins; reordering
//! the rules changes observable behavior (auto-trigger rules must shadow
//! the explicit-invocation rules that would otherwise match the same
//! state).

use xml::{
    CancelToken, Spine, SpineEntry, StateKind, TextSource, TextSpan, is_name_char,
    is_name_start_char,
};

/// Why the classifier is being consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerReason {
    /// Explicit completion request (e.g. ctrl-space).
    Invocation,
    TypedChar,
    Backspace,
}

/// What kind of completion session to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    /// Right after `<`: anything a tag can start.
    Tag,
    ElementName,
    AttributeName,
    AttributeValue,
    /// `<!`: comment / CDATA / doctype openers.
    Declaration,
    DocType,
    Entity,
    /// Structural completions inside free text.
    ElementValue,
}

/// A resolved trigger: the session kind plus the text range it owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionTrigger {
    pub kind: TriggerKind,
    pub span: TextSpan,
}

/// How to turn a trigger's start offset into a concrete span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanPolicy {
    Fixed(usize),
    /// Run of XML name characters.
    NameRun,
    /// `<` plus either a special literal prefix (`<!--`, `<![CDATA[`) or a
    /// name run.
    TagShape,
    /// Everything read so far: start up to the cursor.
    ToCursor,
    /// Attribute value up to its terminator (matching quote, or the
    /// unquoted stop set).
    ValueRun(Option<char>),
    /// `&` plus a name run.
    EntityRun,
}

#[derive(Clone, Copy, Debug)]
struct PendingTrigger {
    kind: TriggerKind,
    start: usize,
    policy: ScanPolicy,
}

/// Classify an edit and resolve the trigger span.
///
/// `spine` must be the spine at the cursor, `typed` the character for
/// `TypedChar` edits. Forward/backward scans read at most `budget`
/// characters from `source` and honor `cancel` between characters.
pub fn completion_trigger<S: TextSource + ?Sized>(
    spine: &Spine,
    reason: TriggerReason,
    typed: Option<char>,
    source: &S,
    budget: usize,
    cancel: &CancelToken,
) -> Option<CompletionTrigger> {
    let pending = classify(spine, reason, typed, source, budget, cancel)?;
    #[cfg(any(test, feature = "debug-stats"))]
    log::trace!(
        target: "xml.completion",
        "trigger {:?} start={} policy={:?}",
        pending.kind,
        pending.start,
        pending.policy
    );
    Some(resolve(pending, spine.position(), source, budget, cancel))
}

fn classify<S: TextSource + ?Sized>(
    spine: &Spine,
    reason: TriggerReason,
    typed: Option<char>,
    source: &S,
    budget: usize,
    cancel: &CancelToken,
) -> Option<PendingTrigger> {
    let top = spine.innermost();
    let cursor = spine.position();
    let typed_len = typed.map_or(0, char::len_utf8);

    // 1. Invocation inside a partially-typed element/attribute name
    //    re-triggers over the whole name.
    if reason == TriggerReason::Invocation
        && matches!(top.kind, StateKind::ElementName | StateKind::AttributeName)
    {
        return Some(PendingTrigger {
            kind: name_kind(top),
            start: top.token_start,
            policy: ScanPolicy::NameRun,
        });
    }

    // 2. Typing or backspacing down to a bare `<` auto-opens a tag session.
    //    Must precede rule 4 or auto-trigger would be masked.
    if top.is_bare_tag_open()
        && (reason == TriggerReason::Backspace
            || (reason == TriggerReason::TypedChar && typed == Some('<')))
    {
        return Some(PendingTrigger {
            kind: TriggerKind::Tag,
            start: top.start,
            policy: ScanPolicy::TagShape,
        });
    }

    // 3. First name character right after `<` or after attribute space.
    if reason == TriggerReason::TypedChar
        && typed.is_some_and(is_name_char)
        && matches!(top.kind, StateKind::ElementName | StateKind::AttributeName)
        && top.token_len == typed_len
    {
        return Some(PendingTrigger {
            kind: name_kind(top),
            start: top.token_start,
            policy: ScanPolicy::NameRun,
        });
    }

    // 4. Invocation right after `<`.
    if reason == TriggerReason::Invocation && top.is_bare_tag_open() {
        return Some(PendingTrigger {
            kind: TriggerKind::Tag,
            start: top.start,
            policy: ScanPolicy::TagShape,
        });
    }

    // 5. `<!`: the declaration openers.
    if top.kind == StateKind::TagStart
        && top.declaration
        && (reason == TriggerReason::Invocation
            || (reason == TriggerReason::TypedChar && typed == Some('!')))
    {
        return Some(PendingTrigger {
            kind: TriggerKind::Declaration,
            start: top.start,
            policy: ScanPolicy::ToCursor,
        });
    }

    // 6. Invocation inside an existing doctype.
    if reason == TriggerReason::Invocation && top.kind == StateKind::DocType {
        return Some(PendingTrigger {
            kind: TriggerKind::DocType,
            start: top.start,
            policy: ScanPolicy::ToCursor,
        });
    }

    // 7. Attribute free space.
    if top.kind == StateKind::Element && top.in_tag {
        if reason == TriggerReason::TypedChar && typed == Some(' ') {
            return Some(PendingTrigger {
                kind: TriggerKind::AttributeName,
                start: cursor,
                policy: ScanPolicy::Fixed(0),
            });
        }
        if reason == TriggerReason::Invocation {
            return Some(PendingTrigger {
                kind: TriggerKind::AttributeName,
                start: cursor,
                policy: ScanPolicy::NameRun,
            });
        }
    }

    // 8. Attribute values: opening quote typed, or invocation anywhere
    //    inside the value.
    if top.kind == StateKind::AttributeValue {
        let quote_typed = reason == TriggerReason::TypedChar
            && top.token_len == 0
            && typed.is_some()
            && typed == top.delimiter;
        if quote_typed || reason == TriggerReason::Invocation {
            return Some(PendingTrigger {
                kind: TriggerKind::AttributeValue,
                start: top.token_start,
                policy: ScanPolicy::ValueRun(top.delimiter),
            });
        }
    }

    // 9. Entities. The open entity frame covers typed/backspace edits;
    //    invocation in plain text scans backward for a dangling `&`.
    if top.kind == StateKind::EntityReference {
        let wanted = match reason {
            TriggerReason::Invocation | TriggerReason::Backspace => true,
            TriggerReason::TypedChar => {
                (typed == Some('&') && top.token_len == 0)
                    || (typed.is_some_and(is_name_start_char) && top.token_len == typed_len)
            }
        };
        if wanted {
            return Some(PendingTrigger {
                kind: TriggerKind::Entity,
                start: top.start,
                policy: ScanPolicy::EntityRun,
            });
        }
    }
    if reason == TriggerReason::Invocation
        && in_free_text(top)
        && let Some(amp) = backward_entity_start(source, cursor, budget, cancel)
    {
        return Some(PendingTrigger {
            kind: TriggerKind::Entity,
            start: amp,
            policy: ScanPolicy::EntityRun,
        });
    }

    // 10. Invocation in free text with nothing better: offer structural
    //     completions.
    if reason == TriggerReason::Invocation && in_free_text(top) {
        return Some(PendingTrigger {
            kind: TriggerKind::ElementValue,
            start: cursor,
            policy: ScanPolicy::Fixed(0),
        });
    }

    // 11. Nothing matched.
    None
}

fn name_kind(entry: &SpineEntry) -> TriggerKind {
    if entry.kind == StateKind::ElementName {
        TriggerKind::ElementName
    } else {
        TriggerKind::AttributeName
    }
}

fn in_free_text(entry: &SpineEntry) -> bool {
    entry.kind == StateKind::Document || (entry.kind == StateKind::Element && !entry.in_tag)
}

fn resolve<S: TextSource + ?Sized>(
    pending: PendingTrigger,
    cursor: usize,
    source: &S,
    budget: usize,
    cancel: &CancelToken,
) -> CompletionTrigger {
    let length = match pending.policy {
        ScanPolicy::Fixed(length) => length,
        ScanPolicy::NameRun => name_run_len(source, pending.start, budget, cancel),
        ScanPolicy::ToCursor => cursor.saturating_sub(pending.start),
        ScanPolicy::TagShape => {
            if matches_literal(source, pending.start, "<!--") {
                4
            } else if matches_literal(source, pending.start, "<![CDATA[") {
                9
            } else {
                1 + name_run_len(source, pending.start + 1, budget, cancel)
            }
        }
        ScanPolicy::ValueRun(delimiter) => {
            value_run_len(source, pending.start, delimiter, budget, cancel)
        }
        ScanPolicy::EntityRun => 1 + name_run_len(source, pending.start + 1, budget, cancel),
    };
    CompletionTrigger {
        kind: pending.kind,
        span: TextSpan::new(pending.start, length),
    }
}

/// Byte length of the XML name-character run starting at `offset`.
fn name_run_len<S: TextSource + ?Sized>(
    source: &S,
    offset: usize,
    budget: usize,
    cancel: &CancelToken,
) -> usize {
    let mut at = offset;
    let mut scanned = 0usize;
    while scanned < budget && !cancel.is_cancelled() {
        match source.char_at(at) {
            Some(ch) if is_name_char(ch) => {
                at += ch.len_utf8();
                scanned += 1;
            }
            _ => break,
        }
    }
    at - offset
}

/// Byte length of an attribute value starting at `offset` (just inside the
/// opening quote). Quoted values stop at the matching quote or a stray `<`;
/// unquoted values use the whitespace/`>`/`/` stop set.
fn value_run_len<S: TextSource + ?Sized>(
    source: &S,
    offset: usize,
    delimiter: Option<char>,
    budget: usize,
    cancel: &CancelToken,
) -> usize {
    let mut at = offset;
    let mut scanned = 0usize;
    while scanned < budget && !cancel.is_cancelled() {
        let Some(ch) = source.char_at(at) else { break };
        let stop = match delimiter {
            Some(quote) => ch == quote || ch == '<',
            None => xml::is_xml_whitespace(ch) || matches!(ch, '>' | '/' | '<'),
        };
        if stop {
            break;
        }
        at += ch.len_utf8();
        scanned += 1;
    }
    at - offset
}

fn matches_literal<S: TextSource + ?Sized>(source: &S, offset: usize, literal: &str) -> bool {
    let mut at = offset;
    for expected in literal.chars() {
        match source.char_at(at) {
            Some(ch) if ch == expected => at += ch.len_utf8(),
            _ => return false,
        }
    }
    true
}

/// Backward scan for the nearest un-closed `&`: skip the name run ending at
/// `cursor`, then require the character before it to be `&`.
fn backward_entity_start<S: TextSource + ?Sized>(
    source: &S,
    cursor: usize,
    budget: usize,
    cancel: &CancelToken,
) -> Option<usize> {
    let mut at = cursor;
    let mut scanned = 0usize;
    while scanned < budget && !cancel.is_cancelled() {
        let (ch, start) = source.char_before(at)?;
        if ch == '&' {
            return Some(start);
        }
        if !is_name_char(ch) {
            return None;
        }
        at = start;
        scanned += 1;
    }
    None
}
