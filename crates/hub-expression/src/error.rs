//! Error types for expression evaluation

use thiserror::Error;

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Errors that can occur while evaluating a rule expression
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression does not parse
    #[error("invalid expression syntax: {message}")]
    SyntaxError { message: String },

    /// The expression references something that does not exist
    #[error("undefined value: {message}")]
    Undefined { message: String },

    /// Evaluation failed for another reason
    #[error("failed to evaluate expression: {message}")]
    EvalError { message: String },

    /// The expression evaluated fine but not to a bool
    #[error("invalid result of expression, only bool expressions are valid (got {kind})")]
    NotBool { kind: String },
}

impl From<minijinja::Error> for ExpressionError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => ExpressionError::SyntaxError {
                message: err.to_string(),
            },
            minijinja::ErrorKind::UndefinedError => ExpressionError::Undefined {
                message: err.to_string(),
            },
            _ => ExpressionError::EvalError {
                message: err.to_string(),
            },
        }
    }
}
