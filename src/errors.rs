//! Expansion diagnostics.
//!
//! Everything the engine has to say about a macro call goes through a
//! [`DiagnosticSink`]. Diagnostics never change control flow by themselves:
//! the engine decides separately whether a problem aborts the call.

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;

// ============================================================================
// SOURCE LOCATION
// ============================================================================

/// Where a diagnostic was raised: the nearest real source file and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ============================================================================
// DIAGNOSTIC KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
    /// Engine inconsistency, not the user's fault.
    Internal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
        })
    }
}

/// Everything the engine can report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    UnterminatedCall { call: String },
    TooFewArguments { expected: usize, call: String },
    TooManyArguments { expected: usize, call: String },
    /// Only the variadic slot is missing.
    MissingVariadic { expected: usize, call: String },
    EmptyArgument { call: String },
    InvalidPastedToken { text: String },
    InvalidStringLiteral { text: String },
    StringTooLong { limit: usize, text: String },
    OutputOverflow { macro_name: String },
    RescanLimit { macro_name: String, limit: usize },
    LineOutOfRange { line: i64 },
    SubsequentTextInvolved { macro_name: String },
    PragmaOperand { text: String },
    TraceImbalance { macro_name: String },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingVariadic { .. }
            | Self::EmptyArgument { .. }
            | Self::StringTooLong { .. }
            | Self::LineOutOfRange { .. }
            | Self::SubsequentTextInvolved { .. } => Severity::Warning,
            Self::TraceImbalance { .. } => Severity::Internal,
            _ => Severity::Error,
        }
    }

    /// Warning class used by the `warnLevel` mask. `None` for errors.
    pub fn warning_class(&self) -> Option<u8> {
        match self {
            Self::MissingVariadic { .. }
            | Self::LineOutOfRange { .. }
            | Self::SubsequentTextInvolved { .. } => Some(1),
            Self::EmptyArgument { .. } => Some(2),
            Self::StringTooLong { .. } => Some(4),
            _ => None,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnterminatedCall { .. } => "unterminated_call",
            Self::TooFewArguments { .. } => "too_few_arguments",
            Self::TooManyArguments { .. } => "too_many_arguments",
            Self::MissingVariadic { .. } => "missing_variadic",
            Self::EmptyArgument { .. } => "empty_argument",
            Self::InvalidPastedToken { .. } => "invalid_pasted_token",
            Self::InvalidStringLiteral { .. } => "invalid_string_literal",
            Self::StringTooLong { .. } => "string_too_long",
            Self::OutputOverflow { .. } => "output_overflow",
            Self::RescanLimit { .. } => "rescan_limit",
            Self::LineOutOfRange { .. } => "line_out_of_range",
            Self::SubsequentTextInvolved { .. } => "subsequent_text_involved",
            Self::PragmaOperand { .. } => "pragma_operand",
            Self::TraceImbalance { .. } => "trace_imbalance",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedCall { call } => write!(f, "Unterminated macro call \"{call}\""),
            Self::TooFewArguments { expected, call } | Self::MissingVariadic { expected, call } => {
                write!(
                    f,
                    "Less than necessary {expected} argument(s) in macro call \"{call}\""
                )
            }
            Self::TooManyArguments { expected, call } => write!(
                f,
                "More than necessary {expected} argument(s) in macro call \"{call}\""
            ),
            Self::EmptyArgument { call } => write!(f, "Empty argument in macro call \"{call}\""),
            Self::InvalidPastedToken { text } => {
                write!(f, "Not a valid preprocessing token \"{text}\"")
            }
            Self::InvalidStringLiteral { text } => write!(f, "Not a valid string literal {text}"),
            Self::StringTooLong { limit, text } => {
                write!(f, "String literal longer than {limit} bytes {text}")
            }
            Self::OutputOverflow { macro_name } => {
                write!(f, "Buffer overflow expanding macro \"{macro_name}\"")
            }
            Self::RescanLimit { macro_name, limit } => {
                write!(f, "Rescanning macro \"{macro_name}\" more than {limit} times")
            }
            Self::LineOutOfRange { line } => write!(f, "Line number {line} out of range"),
            Self::SubsequentTextInvolved { macro_name } => write!(
                f,
                "Replacement text \"{macro_name}\" of macro involved subsequent text"
            ),
            Self::PragmaOperand { text } => {
                write!(f, "_Pragma operand is not a string literal \"{text}\"")
            }
            Self::TraceImbalance { macro_name } => write!(
                f,
                "Unbalanced trace markers in expansion of \"{macro_name}\""
            ),
        }
    }
}

// ============================================================================
// DIAGNOSTIC
// ============================================================================

/// One report from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDiagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub location: SourceLocation,
    /// Macros being expanded when the problem was found, innermost first.
    pub chain: Vec<String>,
}

impl MacroDiagnostic {
    pub fn new(kind: DiagnosticKind, location: SourceLocation, chain: Vec<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            location,
            chain,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }

    pub fn code(&self) -> String {
        format!("indigo::expand::{}", self.kind.code_suffix())
    }

    /// "in expansion of macro ..." notes, innermost first.
    pub fn chain_notes(&self) -> Vec<String> {
        self.chain
            .iter()
            .map(|name| format!("in expansion of macro \"{name}\""))
            .collect()
    }
}

impl fmt::Display for MacroDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.kind)
    }
}

impl std::error::Error for MacroDiagnostic {}

impl Diagnostic for MacroDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(MacroDiagnostic::code(self)))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::Error | Severity::Internal => miette::Severity::Error,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        if self.severity == Severity::Internal {
            return Some(Box::new(
                "This is an internal engine error. Please report this as a bug.",
            ));
        }
        if self.chain.is_empty() {
            return None;
        }
        Some(Box::new(self.chain_notes().join("\n")))
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Receiver of expansion diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: MacroDiagnostic);

    fn report_error(&mut self, kind: DiagnosticKind, location: SourceLocation, chain: Vec<String>) {
        let mut diagnostic = MacroDiagnostic::new(kind, location, chain);
        diagnostic.severity = diagnostic.severity.max(Severity::Error);
        self.report(diagnostic);
    }

    fn report_warning(&mut self, kind: DiagnosticKind, location: SourceLocation, chain: Vec<String>) {
        let mut diagnostic = MacroDiagnostic::new(kind, location, chain);
        diagnostic.severity = Severity::Warning;
        self.report(diagnostic);
    }
}

/// Keeps every diagnostic in order of arrival.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub diagnostics: Vec<MacroDiagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &MacroDiagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &MacroDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Number of diagnostics with the given code suffix.
    pub fn count(&self, code_suffix: &str) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind.code_suffix() == code_suffix)
            .count()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: MacroDiagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: MacroDiagnostic) {
        let chain = diagnostic.chain.join(" <- ");
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                code = %diagnostic.code(),
                location = %diagnostic.location,
                chain = %chain,
                "{}",
                diagnostic.kind
            ),
            Severity::Error | Severity::Internal => tracing::error!(
                code = %diagnostic.code(),
                location = %diagnostic.location,
                chain = %chain,
                "{}",
                diagnostic.kind
            ),
        }
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a diagnostic with full miette formatting.
pub fn print_diagnostic(diagnostic: &MacroDiagnostic) {
    let report = miette::Report::new(diagnostic.clone());
    eprintln!("{}: {report:?}", diagnostic.location);
}
