//! Trigger decision-table scenarios over real spines.

use xml::{CancelToken, DEFAULT_READAHEAD, TextSpan, XmlParser};
use xml_completion::{CompletionTrigger, TriggerKind, TriggerReason, completion_trigger};

fn trigger_for(
    text: &str,
    cursor: usize,
    reason: TriggerReason,
    typed: Option<char>,
) -> Option<CompletionTrigger> {
    let spine = XmlParser::spine_at(text, cursor);
    completion_trigger(
        &spine,
        reason,
        typed,
        text,
        DEFAULT_READAHEAD,
        &CancelToken::new(),
    )
}

#[test]
fn invocation_in_empty_buffer_offers_element_values() {
    let trigger = trigger_for("", 0, TriggerReason::Invocation, None)
        .expect("empty buffer invocation must trigger");
    assert_eq!(trigger.kind, TriggerKind::ElementValue);
    assert_eq!(trigger.span, TextSpan::new(0, 0));
}

#[test]
fn typed_tag_open_triggers_tags_over_the_bracket() {
    let trigger = trigger_for("<", 1, TriggerReason::TypedChar, Some('<'))
        .expect("typed < must trigger");
    assert_eq!(trigger.kind, TriggerKind::Tag);
    assert_eq!(trigger.span, TextSpan::new(0, 1), "span covers the <");
}

#[test]
fn backspace_to_bare_tag_open_retriggers() {
    let trigger = trigger_for("<", 1, TriggerReason::Backspace, None)
        .expect("backspace down to < must trigger");
    assert_eq!(trigger.kind, TriggerKind::Tag);
    assert_eq!(trigger.span, TextSpan::new(0, 1));
}

#[test]
fn typed_space_in_tag_triggers_attribute_names_at_cursor() {
    let trigger = trigger_for("<foo ", 5, TriggerReason::TypedChar, Some(' '))
        .expect("space inside a tag must trigger");
    assert_eq!(trigger.kind, TriggerKind::AttributeName);
    assert_eq!(trigger.span, TextSpan::new(5, 0));
}

#[test]
fn invocation_inside_open_attribute_value_starts_inside_the_quote() {
    let trigger = trigger_for("<foo bar='", 10, TriggerReason::Invocation, None)
        .expect("invocation in an attribute value must trigger");
    assert_eq!(trigger.kind, TriggerKind::AttributeValue);
    assert_eq!(trigger.span, TextSpan::new(10, 0));
}

#[test]
fn invocation_after_dangling_entity_covers_it() {
    let trigger = trigger_for("&blah", 5, TriggerReason::Invocation, None)
        .expect("dangling entity must trigger");
    assert_eq!(trigger.kind, TriggerKind::Entity);
    assert_eq!(trigger.span, TextSpan::new(0, 5), "span covers &blah");
}

#[test]
fn typed_tag_open_wins_over_invocation_handling() {
    // Rules are priority ordered: the auto-trigger for a typed `<` and the
    // invocation trigger for the same spine state must both resolve to a
    // tag session, whichever path is taken.
    let typed = trigger_for("<", 1, TriggerReason::TypedChar, Some('<')).expect("typed");
    let invoked = trigger_for("<", 1, TriggerReason::Invocation, None).expect("invoked");
    assert_eq!(typed.kind, TriggerKind::Tag);
    assert_eq!(invoked.kind, TriggerKind::Tag);
    assert_eq!(typed.span, invoked.span);
}

#[test]
fn typing_inside_comment_or_cdata_never_triggers() {
    let comment = "<!-- hello ";
    assert_eq!(
        trigger_for(comment, comment.len(), TriggerReason::TypedChar, Some(' ')),
        None
    );
    let cdata = "<![CDATA[ x";
    assert_eq!(
        trigger_for(cdata, cdata.len(), TriggerReason::TypedChar, Some('x')),
        None
    );
}

#[test]
fn cancellation_yields_a_partial_span_not_a_failure() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let spine = XmlParser::spine_at("<div", 2);
    let trigger = completion_trigger(
        &spine,
        TriggerReason::Invocation,
        None,
        "<div",
        DEFAULT_READAHEAD,
        &cancel,
    )
    .expect("classification does not depend on the scan");
    assert_eq!(trigger.kind, TriggerKind::ElementName);
    assert_eq!(
        trigger.span,
        TextSpan::new(1, 0),
        "cancelled scan resolves to the partial (empty) run"
    );
}

#[test]
fn scan_budget_caps_the_resolved_span() {
    let mut text = String::from("<");
    text.push_str(&"x".repeat(50));
    let spine = XmlParser::spine_at(&text, 1);
    let trigger = completion_trigger(
        &spine,
        TriggerReason::Invocation,
        None,
        text.as_str(),
        10,
        &CancelToken::new(),
    )
    .expect("invocation after < must trigger");
    assert_eq!(trigger.kind, TriggerKind::Tag);
    assert_eq!(
        trigger.span,
        TextSpan::new(0, 11),
        "the < plus a budget-capped name run"
    );
}
