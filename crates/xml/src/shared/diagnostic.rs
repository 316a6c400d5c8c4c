//! Parse diagnostics.
//!
//! Malformed input is never an error path: every problem the state machine
//! detects becomes a `Diagnostic` collected in parse order. The only panics
//! in this module are programmer-contract violations (formatting a template
//! with a missing argument).

use super::span::TextSpan;

/// Diagnostic severity bit-flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Severity(u8);

impl Severity {
    pub const NONE: Severity = Severity(0);
    pub const SUGGESTION: Severity = Severity(1);
    pub const WARNING: Severity = Severity(1 << 1);
    pub const ERROR: Severity = Severity(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Severity) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_error(self) -> bool {
        self.contains(Severity::ERROR)
    }
}

impl std::ops::BitOr for Severity {
    type Output = Severity;

    fn bitor(self, rhs: Severity) -> Severity {
        Severity(self.0 | rhs.0)
    }
}

/// Stable identifier for a diagnostic kind.
///
/// The discriminant doubles as the index into the static descriptor table;
/// `descriptor_table_matches_codes` locks the ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DiagnosticCode {
    UnclosedTag = 0,
    UnmatchedClosingTag,
    UnnamedTag,
    UnnamedClosingTag,
    IncompleteClosingTag,
    IncompleteEndComment,
    InvalidDeclaration,
    InvalidDocType,
    UnnamedProcessingInstruction,
    TagNotClosed,
    UnexpectedCharacterInTag,
    MultipleNamespaceSeparators,
    EmptyNamespace,
    EntityNameExpected,
    IncompleteEntity,
    DuplicateAttribute,
    UnquotedAttributeValue,
    AttributeValueExpected,
    IncompleteAttribute,
    TagEof,
    ClosingTagEof,
    CommentEof,
    CDataEof,
    DocTypeEof,
    ProcessingInstructionEof,
    AttributeEof,
    AttributeValueEof,
    EntityEof,
}

/// Read-only descriptor backing a `DiagnosticCode`.
///
/// The table is built once at compile time and shared by every parser
/// instance; descriptors are addressed by code, never by position in user
/// code.
#[derive(Debug)]
pub struct DiagnosticDescriptor {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Message template; `{n}` substitutes the n-th message argument.
    pub template: &'static str,
}

const DESCRIPTORS: &[DiagnosticDescriptor] = &[
    DiagnosticDescriptor {
        code: DiagnosticCode::UnclosedTag,
        severity: Severity::ERROR,
        template: "element '{0}' is missing a closing tag",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnmatchedClosingTag,
        severity: Severity::ERROR,
        template: "closing tag '{0}' does not match any open element",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnnamedTag,
        severity: Severity::ERROR,
        template: "tag has no name",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnnamedClosingTag,
        severity: Severity::ERROR,
        template: "closing tag has no name",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::IncompleteClosingTag,
        severity: Severity::ERROR,
        template: "closing tag is not terminated by '>'",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::IncompleteEndComment,
        severity: Severity::ERROR,
        template: "'--' inside a comment must be followed by '>'",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::InvalidDeclaration,
        severity: Severity::ERROR,
        template: "'<!' does not begin a comment, CDATA section or doctype",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::InvalidDocType,
        severity: Severity::ERROR,
        template: "unexpected '{0}' in doctype declaration",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnnamedProcessingInstruction,
        severity: Severity::ERROR,
        template: "processing instruction has no target name",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::TagNotClosed,
        severity: Severity::ERROR,
        template: "tag '{0}' was not closed before the next tag started",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnexpectedCharacterInTag,
        severity: Severity::ERROR,
        template: "unexpected character '{0}' in tag",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::MultipleNamespaceSeparators,
        severity: Severity::ERROR,
        template: "name '{0}' contains more than one ':'",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::EmptyNamespace,
        severity: Severity::ERROR,
        template: "name '{0}' has an empty namespace prefix or local part",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::EntityNameExpected,
        severity: Severity::ERROR,
        template: "'&' is not followed by an entity name",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::IncompleteEntity,
        severity: Severity::ERROR,
        template: "entity reference '{0}' is not terminated by ';'",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::DuplicateAttribute,
        severity: Severity::ERROR,
        template: "attribute '{0}' appears more than once on this element",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::UnquotedAttributeValue,
        severity: Severity::WARNING,
        template: "attribute value is not quoted",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::AttributeValueExpected,
        severity: Severity::ERROR,
        template: "attribute '{0}' has no value",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::IncompleteAttribute,
        severity: Severity::ERROR,
        template: "attribute value was terminated by an unexpected character",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::TagEof,
        severity: Severity::ERROR,
        template: "end of input inside a tag",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::ClosingTagEof,
        severity: Severity::ERROR,
        template: "end of input inside a closing tag",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::CommentEof,
        severity: Severity::ERROR,
        template: "end of input inside a comment",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::CDataEof,
        severity: Severity::ERROR,
        template: "end of input inside a CDATA section",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::DocTypeEof,
        severity: Severity::ERROR,
        template: "end of input inside a doctype declaration",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::ProcessingInstructionEof,
        severity: Severity::ERROR,
        template: "end of input inside a processing instruction",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::AttributeEof,
        severity: Severity::ERROR,
        template: "end of input inside an attribute",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::AttributeValueEof,
        severity: Severity::ERROR,
        template: "end of input inside an attribute value",
    },
    DiagnosticDescriptor {
        code: DiagnosticCode::EntityEof,
        severity: Severity::ERROR,
        template: "end of input inside an entity reference",
    },
];

impl DiagnosticCode {
    pub fn descriptor(self) -> &'static DiagnosticDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn severity(self) -> Severity {
        self.descriptor().severity
    }
}

/// A single parse problem, bound to the region where it was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub span: TextSpan,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, span: TextSpan) -> Self {
        Self {
            code,
            span,
            args: Vec::new(),
        }
    }

    pub fn with_arg(code: DiagnosticCode, span: TextSpan, arg: impl Into<String>) -> Self {
        Self {
            code,
            span,
            args: vec![arg.into()],
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Render the descriptor template with this diagnostic's arguments.
    ///
    /// Formatting is lazy: nothing is allocated until a consumer actually
    /// wants the text. A template placeholder with no matching argument is a
    /// malformed descriptor/emit pair and panics.
    pub fn message(&self) -> String {
        let template = self.code.descriptor().template;
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars();
        while let Some(ch) = chars.next() {
            if ch != '{' {
                out.push(ch);
                continue;
            }
            let index = chars
                .next()
                .and_then(|d| d.to_digit(10))
                .unwrap_or_else(|| panic!("malformed template for {:?}", self.code));
            assert_eq!(
                chars.next(),
                Some('}'),
                "malformed template for {:?}",
                self.code
            );
            let arg = self.args.get(index as usize).unwrap_or_else(|| {
                panic!(
                    "template for {:?} references argument {} but only {} were supplied",
                    self.code,
                    index,
                    self.args.len()
                )
            });
            out.push_str(arg);
        }
        out
    }
}
