use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::server::ServerAddress;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("cache refresh calls can only be enqueued inside a request scope")]
    UnsupportedContext,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("`{argument}` is out of range: {value}")]
    ArgumentOutOfRange {
        argument: &'static str,
        value: String,
    },
    #[error("refresh dispatch to `{server}` failed: {source}")]
    Transport {
        server: ServerAddress,
        #[source]
        source: TransportError,
    },
    #[error("refresh batch could not be dispatched: {0}")]
    Batch(String),
    #[error("no cache refresher registered with id `{0}`")]
    UnknownRefresher(Uuid),
    #[error("invalid refresh payload: {0}")]
    Payload(String),
}

impl From<DomainError> for MessengerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidState { message } => Self::InvalidState(message),
            DomainError::ArgumentOutOfRange { argument, value } => {
                Self::ArgumentOutOfRange { argument, value }
            }
            DomainError::Validation { message } => Self::Payload(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
