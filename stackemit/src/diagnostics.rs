//! Diagnostic reporting infrastructure.
//!
//! Emission only raises a handful of recoverable diagnostics; everything else
//! is either valid output or an internal compiler error (see [`crate::ice`]).
//!
//! # Error Codes
//!
//! - **E0300-E0399**: Emission errors and notes

use std::fmt;

use parking_lot::Mutex;

use crate::span::Span;

/// Emission error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// A delegate type has no `(object, native int)` constructor.
    BadDelegateConstructor = 301,
    /// The runtime lacks the helper used to view a data blob as a span.
    MissingBlobViewHelper = 302,
}

impl ErrorCode {
    /// Get the formatted error code string (e.g., "E0301").
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::BadDelegateConstructor => "delegate type does not have a valid constructor",
            ErrorCode::MissingBlobViewHelper => "runtime helper for read-only blob views is unavailable",
        }
    }

    /// Get a help message suggesting how to fix the error.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::BadDelegateConstructor => {
                Some("delegate types must declare a constructor taking (object, native int)")
            }
            ErrorCode::MissingBlobViewHelper => None,
        }
    }
}

/// The kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An error that prevents a valid output.
    Error,
    /// A warning that doesn't prevent compilation.
    Warning,
    /// An informational note.
    Note,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Error => write!(f, "error"),
            DiagnosticKind::Warning => write!(f, "warning"),
            DiagnosticKind::Note => write!(f, "note"),
        }
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The kind of diagnostic.
    pub kind: DiagnosticKind,
    /// The error code (e.g., "E0301").
    pub code: Option<String>,
    /// The main message.
    pub message: String,
    /// The primary span where the problem occurred.
    pub span: Span,
    /// Additional labels pointing to relevant code.
    pub labels: Vec<DiagnosticLabel>,
    /// Suggestions for fixing the problem.
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn with_kind(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::with_kind(DiagnosticKind::Error, message, span)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::with_kind(DiagnosticKind::Warning, message, span)
    }

    /// Create a new note.
    pub fn note(message: impl Into<String>, span: Span) -> Self {
        Self::with_kind(DiagnosticKind::Note, message, span)
    }

    /// Set the error code from an ErrorCode enum.
    /// Automatically adds the help message if available.
    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code.as_str());
        if let Some(help) = code.help() {
            self.suggestions.push(help.to_string());
        }
        self
    }

    /// Add a note to help explain the diagnostic.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::secondary(span, message));
        self
    }

    /// Add a primary label.
    pub fn with_primary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::primary(span, message));
        self
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}[{}] at {}: {}", self.kind, code, self.span, self.message),
            None => write!(f, "{} at {}: {}", self.kind, self.span, self.message),
        }
    }
}

/// A secondary label in a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagnosticLabel {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
    /// Whether this is the primary label.
    pub primary: bool,
}

impl DiagnosticLabel {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: true,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: false,
        }
    }
}

/// Collects diagnostics from any number of method-body workers.
///
/// Appends are serialized through a mutex; nothing else about emission is
/// shared between workers.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic reported");
        self.entries.lock().push(diagnostic);
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether any collected diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.entries.lock().iter().any(Diagnostic::is_error)
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Drain all collected diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }
}
