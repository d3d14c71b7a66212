//! Internal compiler errors.
//!
//! An ICE means an upstream pass handed emission a tree it cannot legally
//! receive: an unlowered conversion kind, an assignment to a non-assignable
//! node, a numeric conversion between non-numeric types. Emission of the
//! current method stops and the error is propagated to the driver.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// An internal invariant failure raised while emitting a method body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal compiler error at {span}: {message}{}", NotesDisplay(.notes))]
pub struct InternalError {
    /// What went wrong.
    pub message: String,
    /// The node being emitted when the failure was detected.
    pub span: Span,
    /// Key/value context attached at the raise site.
    pub notes: Vec<(String, String)>,
}

impl InternalError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    /// Attach a context note.
    pub fn with_note(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.notes.push((key.into(), value.to_string()));
        self
    }
}

struct NotesDisplay<'a>(&'a [(String, String)]);

impl fmt::Display for NotesDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.0 {
            write!(f, "\n  {}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Result of an emission step that can only fail with an ICE.
pub type EmitResult<T> = Result<T, InternalError>;

/// Build an [`InternalError`] and log it.
///
/// ```
/// use stackemit::{ice_err, span::Span};
///
/// let err = ice_err!(Span::dummy(), "unexpected conversion";
///                    "kind" => "user-defined");
/// assert_eq!(err.notes.len(), 1);
/// ```
#[macro_export]
macro_rules! ice_err {
    ($span:expr, $msg:expr $(; $($key:literal => $value:expr),+ $(,)?)?) => {{
        let err = $crate::ice::InternalError::new($msg, $span)
            $($(.with_note($key, $value))+)?;
        ::tracing::error!(error = %err, "internal compiler error");
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ice_err_collects_notes() {
        let err = ice_err!(Span::new(1, 2, 1, 2), "bad node";
                           "kind" => "Literal",
                           "depth" => 3);
        assert_eq!(err.message, "bad node");
        assert_eq!(err.notes[1], ("depth".to_string(), "3".to_string()));
    }

    #[test]
    fn test_display_includes_notes() {
        let err = InternalError::new("oops", Span::new(0, 1, 4, 2)).with_note("expected", "value");
        let text = err.to_string();
        assert!(text.starts_with("internal compiler error at 4:2: oops"));
        assert!(text.contains("expected: value"));
    }
}
