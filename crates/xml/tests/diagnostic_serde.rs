//! Shape lock for the serde feature: editor integrations ship these
//! records over JSON-shaped boundaries, so the encoding is contractual.

#![cfg(feature = "serde")]

use xml::{Diagnostic, DiagnosticCode, Severity, TextSpan, XmlParser};

#[test]
fn diagnostic_json_shape_is_stable() {
    let diagnostic = Diagnostic::with_arg(
        DiagnosticCode::UnmatchedClosingTag,
        TextSpan::new(6, 4),
        "c",
    );
    let value = serde_json::to_value(&diagnostic).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({
            "code": "UnmatchedClosingTag",
            "span": { "start": 6, "length": 4 },
            "args": ["c"],
        })
    );
}

#[test]
fn severity_serializes_as_its_bits() {
    assert_eq!(
        serde_json::to_value(Severity::ERROR).expect("serialize"),
        serde_json::json!(4)
    );
    assert_eq!(
        serde_json::to_value(Severity::WARNING | Severity::ERROR).expect("serialize"),
        serde_json::json!(6)
    );
}

#[test]
fn parsed_diagnostics_round_trip() {
    let document = XmlParser::parse("<a><b></c></a>");
    let encoded = serde_json::to_string(document.diagnostics()).expect("serialize");
    let decoded: Vec<Diagnostic> = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(decoded.as_slice(), document.diagnostics());
}
