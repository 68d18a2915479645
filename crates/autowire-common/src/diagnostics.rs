//! Diagnostic infrastructure for the resolution pipeline.
//!
//! All violations found during a pass are accumulated in a [`DiagnosticSink`]
//! rather than raised at the first fault: the pass always runs to completion
//! over the whole universe so a single invocation surfaces every independent
//! violation.
//!
//! # Components
//!
//! - `Diagnostic` - a single message with a numeric code and severity
//! - `DiagnosticSink` - the shared accumulator for one resolution pass
//! - `codes` - the numeric code space for the error taxonomy
//!
//! # Example
//!
//! ```ignore
//! let mut sink = DiagnosticSink::new();
//! sink.error(codes::CONSTRUCTOR_ARITY, "OrderService", &["OrderService", "2"]);
//! assert!(sink.has_errors());
//! ```

use std::fmt;

// =============================================================================
// Severity
// =============================================================================

/// The severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// An error (fatal for the produced result)
    Error,
    /// A warning
    Warning,
    /// Informational message attached to another diagnostic
    Message,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Message => "message",
        }
    }
}

// =============================================================================
// Codes and message templates
// =============================================================================

/// Numeric diagnostic codes, one per taxonomy entry.
pub mod codes {
    /// Illegal kind-flag combination for a class or interface.
    pub const INVALID_COMBINATION: u32 = 3001;
    /// A concrete service class does not expose exactly one public constructor.
    pub const CONSTRUCTOR_ARITY: u32 = 3002;
    /// A constructor parameter names an unregistered, non-excluded concrete class.
    pub const UNRESOLVABLE_DEPENDENCY: u32 = 3003;
    /// Unification failed at a family root.
    pub const SUPERGRAPH_AMBIGUITY: u32 = 3004;
    /// Unification failed at an internal branch of a family.
    pub const SUBGRAPH_AMBIGUITY: u32 = 3005;
    /// More than one valid unifier candidate at one level.
    pub const DUPLICATE_UNIFIER: u32 = 3006;
    /// A more general open generic conflicts with a more specific assignment.
    pub const GENERIC_ASSIGNMENT_CONFLICT: u32 = 3007;
    /// A canonical marker identifier was registered twice.
    pub const MARKER_COLLISION: u32 = 3008;
}

/// A static message template keyed by code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub severity: Severity,
    pub message: &'static str,
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: codes::INVALID_COMBINATION,
        severity: Severity::Error,
        message: "Invalid kind combination for '{0}': {1}.",
    },
    DiagnosticMessage {
        code: codes::CONSTRUCTOR_ARITY,
        severity: Severity::Error,
        message: "Class '{0}' must expose exactly one public constructor, found {1}.",
    },
    DiagnosticMessage {
        code: codes::UNRESOLVABLE_DEPENDENCY,
        severity: Severity::Error,
        message: "Constructor of '{0}' references '{1}' which is not registered.",
    },
    DiagnosticMessage {
        code: codes::SUPERGRAPH_AMBIGUITY,
        severity: Severity::Error,
        message: "Unable to unify family '{0}': no unique class covers {1}.",
    },
    DiagnosticMessage {
        code: codes::SUBGRAPH_AMBIGUITY,
        severity: Severity::Error,
        message: "Unable to unify branch '{0}': no unique class covers {1}.",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_UNIFIER,
        severity: Severity::Error,
        message: "Multiple unifier candidates for '{0}': {1}.",
    },
    DiagnosticMessage {
        code: codes::GENERIC_ASSIGNMENT_CONFLICT,
        severity: Severity::Error,
        message: "Generic kind assigned to '{0}' conflicts with the more specific '{1}'.",
    },
    DiagnosticMessage {
        code: codes::MARKER_COLLISION,
        severity: Severity::Error,
        message: "Marker identifier '{0}' is mapped more than once.",
    },
];

/// Looks up the message template for a code.
pub fn message_template(code: u32) -> Option<&'static str> {
    DIAGNOSTIC_MESSAGES
        .iter()
        .find(|m| m.code == code)
        .map(|m| m.message)
}

/// Substitutes `{0}`, `{1}`, ... placeholders with the given arguments.
pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

// =============================================================================
// Diagnostic
// =============================================================================

/// Extra context attached to a diagnostic (e.g. the other conflicting site).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInformation {
    pub type_name: String,
    pub message: String,
}

/// A single diagnostic produced by the resolution pass.
///
/// There is no source text at this layer; diagnostics point at types by
/// their full name instead of spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: u32,
    pub severity: Severity,
    /// Full name of the type the diagnostic is anchored on.
    pub type_name: String,
    pub message: String,
    pub related: Vec<RelatedInformation>,
}

impl Diagnostic {
    pub fn new(code: u32, severity: Severity, type_name: impl Into<String>, args: &[&str]) -> Self {
        let template = message_template(code).unwrap_or("{0}");
        Diagnostic {
            code,
            severity,
            type_name: type_name.into(),
            message: format_message(template, args),
            related: Vec::new(),
        }
    }

    pub fn with_related(
        mut self,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.related.push(RelatedInformation {
            type_name: type_name.into(),
            message: message.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} AW{}: {} ({})",
            self.severity.name(),
            self.code,
            self.message,
            self.type_name
        )
    }
}

// =============================================================================
// DiagnosticSink
// =============================================================================

/// Accumulator for every diagnostic produced by one resolution pass.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink {
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Records an error-severity diagnostic built from its code template.
    pub fn error(&mut self, code: u32, type_name: impl Into<String>, args: &[&str]) {
        self.push(Diagnostic::new(code, Severity::Error, type_name, args));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Consumes the sink, returning the collected diagnostics.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
