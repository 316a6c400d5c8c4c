//! Checkpoint/resume equivalence across split points.
//!
//! Splits are deterministic: small fixed sizes plus boundary-aware
//! positions around `<`, `>`, quotes and `&`, the characters where parser
//! state actually turns over.

mod common;

use common::{CORPUS, tree_lines};
use xml::XmlParser;

fn split_points(text: &str) -> Vec<usize> {
    let mut points = vec![0, text.len()];
    for size in [1usize, 2, 3, 5, 8] {
        if size <= text.len() {
            points.push(size);
        }
    }
    for (offset, ch) in text.char_indices() {
        if matches!(ch, '<' | '>' | '"' | '\'' | '&' | '/' | '=' | '!') {
            points.push(offset);
            points.push(offset + ch.len_utf8());
        }
    }
    points.retain(|p| *p <= text.len() && text.is_char_boundary(*p));
    points.sort_unstable();
    points.dedup();
    points
}

fn parse_prefix(text: &str, end: usize, tree: bool) -> XmlParser {
    let mut parser = if tree {
        XmlParser::tree_builder()
    } else {
        XmlParser::spine_only()
    };
    for ch in text[..end].chars() {
        parser.push(ch);
    }
    parser
}

#[test]
fn resumed_tree_parse_matches_one_pass() {
    for text in CORPUS {
        let expected = parse_prefix(text, text.len(), true).into_document();
        let expected_lines = tree_lines(&expected);

        for split in split_points(text) {
            let prefix = parse_prefix(text, split, true);
            let checkpoint = prefix.checkpoint();
            let mut resumed = XmlParser::resume(&checkpoint);
            for ch in text[split..].chars() {
                resumed.push(ch);
            }
            let resumed_doc = resumed.into_document();
            assert_eq!(
                tree_lines(&resumed_doc),
                expected_lines,
                "tree diverged for {text:?} split at {split}"
            );
            assert_eq!(
                resumed_doc.diagnostics(),
                expected.diagnostics(),
                "diagnostics diverged for {text:?} split at {split}"
            );
        }
    }
}

#[test]
fn resumed_spine_matches_one_pass() {
    for text in CORPUS {
        let one_pass = parse_prefix(text, text.len(), false);
        let expected = one_pass.spine();

        for split in split_points(text) {
            let prefix = parse_prefix(text, split, false);
            let checkpoint = prefix.checkpoint();
            let mut resumed = XmlParser::resume(&checkpoint);
            for ch in text[split..].chars() {
                resumed.push(ch);
            }
            let spine = resumed.spine();
            assert_eq!(
                spine.entries(),
                expected.entries(),
                "spine diverged for {text:?} split at {split}"
            );
            assert_eq!(spine.position(), expected.position());
        }
    }
}

#[test]
fn checkpoint_does_not_capture_later_pushes() {
    let text = "<a><b>";
    let prefix = parse_prefix(text, 3, true);
    let checkpoint = prefix.checkpoint();

    // Drive one fork forward; the checkpoint must stay untouched.
    let mut fork = XmlParser::resume(&checkpoint);
    for ch in text[3..].chars() {
        fork.push(ch);
    }
    assert_eq!(fork.position(), text.len());
    assert_eq!(checkpoint.position(), 3);

    let mut second = XmlParser::resume(&checkpoint);
    assert_eq!(second.position(), 3);
    second.push('x');
    assert_eq!(second.position(), 4);
}

#[test]
fn spine_only_checkpoints_carry_no_tree() {
    let mut parser = XmlParser::spine_only();
    for ch in "<a><b>".chars() {
        parser.push(ch);
    }
    let checkpoint = parser.checkpoint();
    assert!(!checkpoint.is_tree_building());
    let resumed = XmlParser::resume(&checkpoint);
    assert_eq!(resumed.spine().entries(), parser.spine().entries());
}
