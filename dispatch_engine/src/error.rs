use thiserror::Error;

/// Errors raised before or during a single simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Degenerate arithmetic: {0}")]
    ArithmeticDegenerate(String),
}

impl DispatchError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        DispatchError::MalformedInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
