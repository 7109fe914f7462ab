//! Diagnostics shared by the binder, solver and checker.
//!
//! The engine never throws for user-level problems: every query is total
//! and failures are reported as `Diagnostic` values for the host to render.
//! Message templates live in a static table keyed by stable numeric codes,
//! with `{0}`-style placeholders substituted at report time.

use crate::span::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

/// Stable diagnostic codes.
///
/// Codes are part of the external surface: hosts key quick-fix and
/// suppression logic on them, so existing codes must never be renumbered.
pub mod codes {
    /// Name not found in any scope (closed receiver type).
    pub const UNRESOLVED_REFERENCE: u32 = 1001;
    /// Name not found, but the receiver is `Dynamic`-typed and may gain
    /// members at runtime.
    pub const UNRESOLVED_REFERENCE_DYNAMIC: u32 = 1002;
    /// Computed type is not a subtype of the expected type and no common
    /// subtype exists.
    pub const TYPE_MISMATCH: u32 = 1101;
    /// Computed type is not a subtype of the expected type, but a runtime
    /// narrowing could still succeed.
    pub const TYPE_MISMATCH_WEAK: u32 = 1102;
    /// Refinement constraint is provably false for the assigned value.
    pub const CONSTRAINT_VIOLATION: u32 = 1201;
    /// Module extends/amends chain or type alias references itself.
    pub const CYCLIC_DECLARATION: u32 = 1301;
    /// Attempt to amend a type that is not Typed/Dynamic/Listing/Mapping.
    pub const INVALID_AMENDMENT: u32 = 1401;
    /// Attempt to instantiate an abstract or non-instantiable type.
    pub const INVALID_INSTANTIATION: u32 = 1402;
    /// Non-abstract amending declaration leaves an inherited required
    /// property undefined.
    pub const MISSING_PARENT_PROPERTY: u32 = 1501;
    /// Reference from a const context to a non-const declaration.
    pub const CONST_REFERENCE_VIOLATION: u32 = 1601;
    /// Amendment overrides a `fixed` property.
    pub const FIXED_PROPERTY_OVERRIDE: u32 = 1602;
    /// Glob expansion hit the hard iteration cap and was truncated.
    pub const GLOB_EXPANSION_TRUNCATED: u32 = 1701;
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: codes::UNRESOLVED_REFERENCE,
        category: DiagnosticCategory::Error,
        message: "Cannot resolve {0} `{1}`.",
    },
    DiagnosticMessage {
        code: codes::UNRESOLVED_REFERENCE_DYNAMIC,
        category: DiagnosticCategory::Warning,
        message: "Cannot statically resolve {0} `{1}` on a `Dynamic` receiver.",
    },
    DiagnosticMessage {
        code: codes::TYPE_MISMATCH,
        category: DiagnosticCategory::Error,
        message: "Expected value of type `{0}`, but got type `{1}`.",
    },
    DiagnosticMessage {
        code: codes::TYPE_MISMATCH_WEAK,
        category: DiagnosticCategory::Warning,
        message: "Value of type `{1}` may not conform to expected type `{0}`.",
    },
    DiagnosticMessage {
        code: codes::CONSTRAINT_VIOLATION,
        category: DiagnosticCategory::Error,
        message: "Value violates type constraint `{0}`.",
    },
    DiagnosticMessage {
        code: codes::CYCLIC_DECLARATION,
        category: DiagnosticCategory::Error,
        message: "`{0}` directly or indirectly references itself.",
    },
    DiagnosticMessage {
        code: codes::INVALID_AMENDMENT,
        category: DiagnosticCategory::Error,
        message: "Cannot amend value of type `{0}`.",
    },
    DiagnosticMessage {
        code: codes::INVALID_INSTANTIATION,
        category: DiagnosticCategory::Error,
        message: "Cannot instantiate type `{0}`.",
    },
    DiagnosticMessage {
        code: codes::MISSING_PARENT_PROPERTY,
        category: DiagnosticCategory::Error,
        message: "Missing definition for inherited required property `{0}`.",
    },
    DiagnosticMessage {
        code: codes::CONST_REFERENCE_VIOLATION,
        category: DiagnosticCategory::Error,
        message: "Cannot reference non-const declaration `{0}` from a const context.",
    },
    DiagnosticMessage {
        code: codes::FIXED_PROPERTY_OVERRIDE,
        category: DiagnosticCategory::Error,
        message: "Cannot override fixed property `{0}`.",
    },
    DiagnosticMessage {
        code: codes::GLOB_EXPANSION_TRUNCATED,
        category: DiagnosticCategory::Warning,
        message: "Glob pattern `{0}` matched too many modules; results were truncated.",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRelatedInformation {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub module_uri: String,
    pub span: Span,
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub module_uri: String,
    pub span: Span,
    pub message_text: String,
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Build a diagnostic from the message table, substituting `args`.
    ///
    /// Unknown codes produce a `Message`-category diagnostic with the raw
    /// arguments, so a missing table entry is visible rather than fatal.
    pub fn new(code: u32, module_uri: impl Into<String>, span: Span, args: &[&str]) -> Self {
        let (category, template) = match get_message(code) {
            Some(m) => (m.category, m.message),
            None => (DiagnosticCategory::Message, "{0}"),
        };
        Self {
            category,
            code,
            module_uri: module_uri.into(),
            span,
            message_text: format_message(template, args),
            related_information: Vec::new(),
        }
    }

    pub fn with_related(
        mut self,
        module_uri: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            category: DiagnosticCategory::Message,
            code: 0,
            module_uri: module_uri.into(),
            span,
            message_text: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

pub fn get_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}
