//! Split-equivalence: resuming from a checkpoint matches a one-pass parse
//! for arbitrary inputs and split points.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xml::XmlParser;

fuzz_target!(|input: (usize, &str)| {
    let (seed, text) = input;
    let mut split = seed % (text.len() + 1);
    while !text.is_char_boundary(split) {
        split -= 1;
    }

    let mut one_pass = XmlParser::tree_builder();
    for ch in text.chars() {
        one_pass.push(ch);
    }

    let mut prefix = XmlParser::tree_builder();
    for ch in text[..split].chars() {
        prefix.push(ch);
    }
    let checkpoint = prefix.checkpoint();
    let mut resumed = XmlParser::resume(&checkpoint);
    for ch in text[split..].chars() {
        resumed.push(ch);
    }

    let expected = one_pass.into_document();
    let actual = resumed.into_document();
    assert_eq!(actual.diagnostics(), expected.diagnostics());
    let expected_nodes: Vec<_> = expected
        .node_ids()
        .map(|id| {
            let node = expected.node(id);
            (node.kind().label(), node.span(), node.parent())
        })
        .collect();
    let actual_nodes: Vec<_> = actual
        .node_ids()
        .map(|id| {
            let node = actual.node(id);
            (node.kind().label(), node.span(), node.parent())
        })
        .collect();
    assert_eq!(actual_nodes, expected_nodes);
});
