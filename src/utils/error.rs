//! Error handling for minicc

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Parser Errors ====================

    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Expected identifier")]
    ExpectedIdent { span: Span },

    #[error("Expected type")]
    ExpectedType { span: Span },

    #[error("Expected expression")]
    ExpectedExpr { span: Span },

    #[error("Expected array size")]
    ExpectedArraySize { span: Span },

    // ==================== Semantic Errors ====================

    #[error("Duplicate declaration: {name}")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("Unbound reference: {name}")]
    UnboundReference { name: String, span: Span },

    #[error("Type error: {message}")]
    TypeError { message: String, span: Span },

    // ==================== Backend Errors ====================

    #[error("No free temporary register left")]
    RegisterExhaustion,

    #[error("Code generation not supported for {0}")]
    Unsupported(String),
}

/// Coarse classification used for counting and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    DuplicateDeclaration,
    UnboundReference,
    TypeError,
    Backend,
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::ExpectedIdent { span } => Some(*span),
            Self::ExpectedType { span } => Some(*span),
            Self::ExpectedExpr { span } => Some(*span),
            Self::ExpectedArraySize { span } => Some(*span),
            Self::DuplicateDeclaration { span, .. } => Some(*span),
            Self::UnboundReference { span, .. } => Some(*span),
            Self::TypeError { span, .. } => Some(*span),
            Self::RegisterExhaustion | Self::Unsupported(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedToken { .. }
            | Self::ExpectedIdent { .. }
            | Self::ExpectedType { .. }
            | Self::ExpectedExpr { .. }
            | Self::ExpectedArraySize { .. } => ErrorKind::Syntax,
            Self::DuplicateDeclaration { .. } => ErrorKind::DuplicateDeclaration,
            Self::UnboundReference { .. } => ErrorKind::UnboundReference,
            Self::TypeError { .. } => ErrorKind::TypeError,
            Self::RegisterExhaustion | Self::Unsupported(_) => ErrorKind::Backend,
        }
    }

    /// Shorthand for a type error at `span`
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::TypeError { message: message.into(), span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_span() {
        let err = Error::type_error("bad", Span::new(1, 2, 0));
        assert_eq!(err.kind(), ErrorKind::TypeError);
        assert_eq!(err.span(), Some(Span::new(1, 2, 0)));
        assert_eq!(err.to_string(), "Type error: bad");

        assert_eq!(Error::RegisterExhaustion.span(), None);
        assert_eq!(Error::RegisterExhaustion.kind(), ErrorKind::Backend);
    }
}
