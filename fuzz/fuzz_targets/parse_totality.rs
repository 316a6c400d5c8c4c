//! Totality: any input parses to a sealed, span-consistent tree.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    let document = xml::XmlParser::parse(text);
    for id in document.node_ids() {
        let node = document.node(id);
        let span = node.span();
        assert!(node.is_sealed());
        assert!(span.end() <= text.len());
        if let Some(parent) = node.parent() {
            assert!(document.node(parent).span().contains_span(span));
        }
    }
    for diagnostic in document.diagnostics() {
        assert!(diagnostic.span.end() <= text.len());
        let _ = diagnostic.message();
    }
});
