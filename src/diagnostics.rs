//! Crate-level error type for the fallible, non-expansion API.
//!
//! # Overview
//!
//! Parsing a `#define`, loading an engine configuration and reading input files
//! can fail outright; those operations return [`IndigoError`]. Problems found
//! *while expanding* are not errors in this sense: they are reported to a
//! [`DiagnosticSink`](crate::errors::DiagnosticSink) and expansion carries on
//! or aborts the current call (see [`crate::errors`]).
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for message-only errors.**
//!   - `err_msg!(Config, "maxRescanDepth must be positive")`
//! - **Use `err_ctx!` when the offending text is at hand.**
//!   - `err_ctx!(Definition, "Duplicate parameter", src, span)`
//!   - `err_ctx!(Definition, "Duplicate parameter", src, span, help)`
//!
//! Pass `src` as a `&SourceArc` built with [`to_error_source`] and `span` as a
//! `miette::SourceSpan`; the macros handle cloning.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};
use thiserror::Error;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification matching the [`IndigoError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Malformed macro definition text.
    Definition,
    /// Invalid or unreadable engine configuration.
    Config,
    /// File system failures.
    Io,
    /// Engine bugs.
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Definition => "definition",
            ErrorType::Config => "config",
            ErrorType::Io => "io",
            ErrorType::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secondary label pointing into the same source.
#[derive(Debug, Clone)]
pub struct RelatedLabel {
    pub span: SourceSpan,
    pub label: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The primary source for this error (if any).
    pub source: Option<SourceArc>,
    /// The primary span for this error (if any).
    pub span: Option<SourceSpan>,
    /// An optional help message.
    pub help: Option<String>,
    /// Additional labeled spans for multi-label diagnostics.
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: SourceSpan) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            ..Self::default()
        }
    }
}

/// Unified error type for every fallible operation outside the expansion loop.
#[derive(Debug, Error)]
pub enum IndigoError {
    #[error("Definition error: {message}")]
    Definition {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl IndigoError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            IndigoError::Definition { ctx, .. }
            | IndigoError::Config { ctx, .. }
            | IndigoError::Io { ctx, .. }
            | IndigoError::Internal { ctx, .. } => ctx,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            IndigoError::Definition { message, .. }
            | IndigoError::Config { message, .. }
            | IndigoError::Io { message, .. }
            | IndigoError::Internal { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            IndigoError::Definition { .. } => ErrorType::Definition,
            IndigoError::Config { .. } => ErrorType::Config,
            IndigoError::Io { .. } => ErrorType::Io,
            IndigoError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// Wraps an underlying error as the `#[source]` of this one.
    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        match &mut self {
            IndigoError::Definition { source, .. }
            | IndigoError::Config { source, .. }
            | IndigoError::Io { source, .. }
            | IndigoError::Internal { source, .. } => *source = Some(Box::new(cause)),
        }
        self
    }
}

impl Diagnostic for IndigoError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("indigo::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        let mut labels = Vec::new();
        if let Some(span) = ctx.span {
            labels.push(LabeledSpan::new_with_span(
                Some(self.message().to_string()),
                span,
            ));
        }
        for rel in &ctx.related {
            labels.push(LabeledSpan::new_with_span(Some(rel.label.clone()), rel.span));
        }
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

/// Converts a named text into a shareable source for error contexts.
pub fn to_error_source(name: impl AsRef<str>, source: impl AsRef<str>) -> SourceArc {
    Arc::new(NamedSource::new(
        name.as_ref(),
        source.as_ref().to_string(),
    ))
}

/// Constructs an `IndigoError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::IndigoError::$variant {
            message: format!($fmt $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::IndigoError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs an `IndigoError` variant pointing at a span of a named source.
#[macro_export]
macro_rules! err_ctx {
    // Message, src, span, help
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::IndigoError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span.into()),
                help: Some(format!("{}", $help)),
                related: vec![],
            },
            source: None,
        }
    };
    // Message, src, span
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::IndigoError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span.into()),
                help: None,
                related: vec![],
            },
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn test_report_includes_message_label_and_help() {
        let src = to_error_source("<define>", "F(a, a) a");
        let err = err_ctx!(
            Definition,
            "Duplicate parameter name \"a\"",
            &src,
            SourceSpan::from(5..6),
            "rename one of the parameters"
        );
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("Duplicate parameter name"));
        assert!(output.contains("rename one of the parameters"));
        assert!(output.contains("indigo::definition"));
    }

    #[test]
    fn test_error_chaining() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = err_msg!(Io, "Failed to read {}", "a.c").with_cause(io);
        assert_eq!(err.error_type(), ErrorType::Io);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("Failed to read a.c"));
        assert!(output.contains("no such file"));
    }

    #[test]
    fn test_related_labels() {
        let src = to_error_source("<define>", "F(a, a) a");
        let mut err = err_ctx!(Definition, "Duplicate parameter", &src, SourceSpan::from(5..6));
        if let IndigoError::Definition { ctx, .. } = &mut err {
            ctx.related.push(RelatedLabel {
                span: SourceSpan::from(2..3),
                label: "first declared here".to_string(),
            });
        }
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("first declared here"));
    }
}
