//! Shared value types: spans, diagnostics, text sources.

mod diagnostic;
mod source;
mod span;

pub use diagnostic::{Diagnostic, DiagnosticCode, DiagnosticDescriptor, Severity};
pub use source::{CancelToken, DEFAULT_READAHEAD, TextSource};
pub use span::TextSpan;
