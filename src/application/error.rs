use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    content::{LookupError, SnapshotError},
    domain::error::DomainError,
    infra::error::InfraError,
    messaging::{MessengerError, TransportError},
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Messenger(#[from] MessengerError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        Self::Unexpected(format!("failed to build refresh transport: {err}"))
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::Messenger(MessengerError::UnknownRefresher(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Domain(_)
            | AppError::Validation(_)
            | AppError::Lookup(_)
            | AppError::Messenger(
                MessengerError::InvalidState(_)
                | MessengerError::ArgumentOutOfRange { .. }
                | MessengerError::Payload(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Messenger(MessengerError::Transport { .. } | MessengerError::Batch(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Messenger(MessengerError::UnsupportedContext)
            | AppError::Snapshot(_)
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::NotFound => "Resource not found",
            AppError::Messenger(MessengerError::UnknownRefresher(_)) => "Unknown cache refresher",
            AppError::Domain(_) | AppError::Validation(_) | AppError::Lookup(_) => {
                "Request could not be processed"
            }
            AppError::Messenger(
                MessengerError::InvalidState(_)
                | MessengerError::ArgumentOutOfRange { .. }
                | MessengerError::Payload(_),
            ) => "Invalid cache refresh request",
            AppError::Messenger(MessengerError::Transport { .. } | MessengerError::Batch(_)) => {
                "Cache refresh could not be delivered"
            }
            AppError::Snapshot(_) => "Published content unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Messenger(MessengerError::UnsupportedContext) | AppError::Unexpected(_) => {
                "Unexpected error occurred"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
