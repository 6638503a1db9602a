use std::fmt::Display;

use modular_storage::migrator::MigrationError;
use modular_types::{
    error::{ApiError, ErrorKind, StatusCode},
    policy::Statement,
};
use sqlx::error::DatabaseError;
use sqlx::sqlite::SqliteError;
use thiserror::Error;
use tracing_error::SpanTrace;

#[derive(Error, Debug)]
pub enum ErrorType {
    #[error("Internal error")]
    Storage(sqlx::Error),
    #[error("Internal error")]
    InternalError(anyhow::Error),
    #[error("Internal error")]
    BadData(String),
    #[error("Internal error")]
    BadResponseData(#[source] serde_json::Error),
    #[error("Internal error")]
    Migration(#[from] MigrationError),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("User is blocked{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    BlockedUser { reason: Option<String> },
    #[error("Token is not active")]
    TokenRevoked,
    #[error("Request rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("No route for `{method} {path}`")]
    NoSuchRoute { method: String, path: String },
    #[error("Access denied for `{module}:{command}`")]
    Denied {
        module: String,
        command: String,
        statement: Option<Statement>,
    },
    #[error("{0}")]
    InvalidPayload(String),
    #[error("Value `{value}` is not allowed for option `{option}`")]
    RestrictedValue { option: String, value: String },
    #[error("Upstream request failed")]
    UpstreamError {
        #[source]
        source: reqwest::Error,
    },
    #[error("Upstream request timed out after {timeout_secs}s")]
    UpstreamTimeout { timeout_secs: u64 },
    #[error("Client version `{advertised}` is below the minimum supported `{minimum}`")]
    UnsupportedClientVersion { advertised: String, minimum: String },
    #[error("Invalid module descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Module `{module}` requires `{dependency}` at version >= {required}")]
    DependencyMissing {
        module: String,
        dependency: String,
        required: String,
    },
    #[error("Mount point `{mount_point}` is already taken by module `{existing}`")]
    MountPointConflict { mount_point: String, existing: String },
    #[error("Module `{module}` is not installed")]
    NotInstalled { module: String },
    #[error("{kind} `{name}` does not exist")]
    ReferencedEntityMissing { kind: &'static str, name: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("A resource with that identifier already exists")]
    UniqueConstraintViolation {
        #[source]
        error: sqlx::Error,
    },
}

#[derive(Error, Debug)]
pub struct Error {
    pub variant: ErrorType,
    pub span_trace: SpanTrace,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.variant, self.span_trace)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        #[allow(clippy::redundant_closure_for_method_calls)]
        if let Some(error_code) = err
            .as_database_error()
            .and_then(|db_err| db_err.try_downcast_ref::<SqliteError>())
        {
            if let Some(code) = error_code.code().map(|str| str.to_string()) {
                // UNIQUE constraint violation
                if code == "1555" || code == "2067" {
                    return Self {
                        variant: ErrorType::UniqueConstraintViolation { error: err },
                        span_trace: SpanTrace::capture(),
                    };
                }
            }
        }
        Self {
            variant: ErrorType::Storage(err),
            span_trace: SpanTrace::capture(),
        }
    }
}

impl From<MigrationError> for Error {
    fn from(err: MigrationError) -> Self {
        Self {
            variant: err.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

impl From<ErrorType> for Error {
    fn from(err: ErrorType) -> Self {
        Self {
            variant: err,
            span_trace: SpanTrace::capture(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (kind, status_code) = match &err.variant {
            ErrorType::Storage(_)
            | ErrorType::InternalError(_)
            | ErrorType::BadData(_)
            | ErrorType::BadResponseData(_)
            | ErrorType::Migration(_) => (ErrorKind::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
            ErrorType::AuthenticationFailed => {
                (ErrorKind::AuthenticationFailed, StatusCode::UNAUTHORIZED)
            }
            ErrorType::BlockedUser { .. } => (ErrorKind::BlockedUser, StatusCode::FORBIDDEN),
            ErrorType::TokenRevoked => (ErrorKind::TokenRevoked, StatusCode::UNAUTHORIZED),
            ErrorType::RateLimited { .. } => {
                (ErrorKind::RateLimited, StatusCode::TOO_MANY_REQUESTS)
            }
            ErrorType::NoSuchRoute { .. } => (ErrorKind::NoSuchRoute, StatusCode::NOT_FOUND),
            ErrorType::Denied { .. } => (ErrorKind::Denied, StatusCode::FORBIDDEN),
            ErrorType::InvalidPayload(_) => (ErrorKind::InvalidPayload, StatusCode::BAD_REQUEST),
            ErrorType::RestrictedValue { .. } => {
                (ErrorKind::RestrictedValue, StatusCode::FORBIDDEN)
            }
            ErrorType::UpstreamError { .. } => (ErrorKind::UpstreamError, StatusCode::BAD_GATEWAY),
            ErrorType::UpstreamTimeout { .. } => {
                (ErrorKind::UpstreamTimeout, StatusCode::GATEWAY_TIMEOUT)
            }
            ErrorType::UnsupportedClientVersion { .. } => {
                (ErrorKind::UnsupportedClientVersion, StatusCode::BAD_REQUEST)
            }
            ErrorType::InvalidDescriptor(_) => {
                (ErrorKind::InvalidDescriptor, StatusCode::BAD_REQUEST)
            }
            ErrorType::DependencyMissing { .. } => {
                (ErrorKind::DependencyMissing, StatusCode::UNPROCESSABLE_ENTITY)
            }
            ErrorType::MountPointConflict { .. } => {
                (ErrorKind::MountPointConflict, StatusCode::CONFLICT)
            }
            ErrorType::NotInstalled { .. } => (ErrorKind::NotInstalled, StatusCode::NOT_FOUND),
            ErrorType::ReferencedEntityMissing { .. } => (
                ErrorKind::ReferencedEntityMissing,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            ErrorType::NotFound(_) => (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            ErrorType::AlreadyExists(_) | ErrorType::UniqueConstraintViolation { .. } => {
                (ErrorKind::AlreadyExists, StatusCode::CONFLICT)
            }
            ErrorType::InvalidState(_) => (ErrorKind::InvalidState, StatusCode::CONFLICT),
        };

        ApiError {
            error: err.variant.into(),
            kind,
            status_code,
            span_trace: Some(err.span_trace),
        }
    }
}
