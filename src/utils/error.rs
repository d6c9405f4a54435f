//! Error handling for Aether Comptime

use crate::runtime::Exception;
use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ==================== Load Errors ====================

    #[error("Failed to read {path}: {message}")]
    Load { path: String, message: String },

    // ==================== Parser Errors ====================

    #[error("Unexpected token at {span}: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    // ==================== Evaluation Errors ====================

    /// An exception escaped module execution or a comptime function call
    #[error("{0}")]
    Raised(Exception),

    // ==================== Rewrite Errors ====================

    #[error("Invalid strategy '{0}'. Use 'match' or 'dict'")]
    UnknownStrategy(String),

    #[error("No precomputed result for comptime function '{0}'")]
    MissingResult(String),

    #[error("Result of comptime function '{function}' cannot be written as a literal: {value}")]
    Unrepresentable { function: String, value: String },

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::Syntax { span, .. } => Some(*span),
            Self::Load { .. }
            | Self::Raised(_)
            | Self::UnknownStrategy(_)
            | Self::MissingResult(_)
            | Self::Unrepresentable { .. }
            | Self::Io(_) => None,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax { message: message.into(), span }
    }
}

impl From<Exception> for Error {
    fn from(exc: Exception) -> Self {
        Self::Raised(exc)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
