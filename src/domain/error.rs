use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid state: {message}")]
    InvalidState { message: String },
    #[error("`{argument}` is out of range: {value}")]
    ArgumentOutOfRange {
        argument: &'static str,
        value: String,
    },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn out_of_range(argument: &'static str, value: impl Into<String>) -> Self {
        Self::ArgumentOutOfRange {
            argument,
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
