use std::fmt::Display;

use http::header::CONTENT_TYPE;
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};
use strum::{Display as StrumDisplay, EnumString};
use thiserror::Error;

pub use http::StatusCode;
use tracing_error::SpanTrace;

/// Stable error identifiers surfaced to clients alongside the message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    StrumDisplay,
    EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    AuthenticationFailed,
    BlockedUser,
    TokenRevoked,
    RateLimited,
    NoSuchRoute,
    Denied,
    InvalidPayload,
    RestrictedValue,
    UpstreamError,
    UpstreamTimeout,
    InternalError,
    InvalidDescriptor,
    DependencyMissing,
    MountPointConflict,
    NotInstalled,
    ReferencedEntityMissing,
    NotFound,
    AlreadyExists,
    InvalidState,
    UnsupportedClientVersion,
}

/// A shared error type used to produce the public error and add additional
/// context for internal diagnostics. The public error is produced from the
/// inner error [`Display`] implementation, the `kind` identifier and the
/// `status_code` field. The internal error report is created from the
/// [`Debug`] implementation and `span_trace` field.
#[serde_as]
#[derive(Error, Debug, Serialize)]
pub struct ApiError {
    // Only the Display format of the source error is returned to the client.
    #[serde_as(as = "DisplayFromStr")]
    #[source]
    pub error: anyhow::Error,
    pub kind: ErrorKind,
    #[serde(skip)]
    pub status_code: StatusCode,
    #[serde(skip)]
    pub span_trace: Option<SpanTrace>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self.report();
        write!(f, "{report:?}")
    }
}

#[derive(Debug)]
pub struct Report {
    pub cause: String,
    pub kind: ErrorKind,
    pub span_trace: Option<SpanTrace>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind, status_code: StatusCode, msg: impl Display) -> Self {
        Self {
            error: anyhow::Error::msg(msg.to_string()),
            kind,
            status_code,
            span_trace: Some(SpanTrace::capture()),
        }
    }

    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(
            ErrorKind::InvalidPayload,
            StatusCode::BAD_REQUEST,
            "Bad request",
        )
    }

    #[must_use]
    pub fn internal_error() -> Self {
        Self::new(
            ErrorKind::InternalError,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error",
        )
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            ErrorKind::AuthenticationFailed,
            StatusCode::UNAUTHORIZED,
            "Authentication failed",
        )
    }

    #[must_use]
    pub fn token_revoked() -> Self {
        Self::new(
            ErrorKind::TokenRevoked,
            StatusCode::UNAUTHORIZED,
            "Token is not active",
        )
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, StatusCode::NOT_FOUND, "Not found")
    }

    #[must_use]
    pub fn report(&self) -> Report {
        Report {
            cause: format!("{:?}", self.error.root_cause()),
            kind: self.kind,
            span_trace: self.span_trace.clone(),
        }
    }
}

impl From<ApiError> for hyper::Response<hyper::Body> {
    fn from(err: ApiError) -> Self {
        match serde_json::to_vec(&err) {
            Ok(err_body) => hyper::Response::builder()
                .header(CONTENT_TYPE, "application/json")
                .status(err.status_code)
                .body(err_body.into())
                .expect("a valid response"),
            Err(_) => hyper::Response::builder()
                .header(CONTENT_TYPE, "application/json")
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Internal error. Unable to return the error response.".into())
                .expect("a valid response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    pub struct DummyError {
        pub debug_field: String,
        pub display_field: String,
    }

    impl std::error::Error for DummyError {}

    impl Display for DummyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", &self.display_field)
        }
    }

    #[test]
    fn serialize_api_error() {
        let err = DummyError {
            debug_field: "debug error".into(),
            display_field: "display error".into(),
        };
        let api_err = ApiError {
            error: err.into(),
            kind: ErrorKind::Denied,
            status_code: StatusCode::FORBIDDEN,
            span_trace: None,
        };

        // Check serialized error response
        let api_err_serialized = serde_json::to_string(&api_err).unwrap();
        assert_eq!(
            api_err_serialized,
            r#"{"error":"display error","kind":"denied"}"#
        );

        // The error report should use the Debug impl of the root cause
        let err_report = api_err.report();
        assert_eq!(
            err_report.cause,
            r#"DummyError { debug_field: "debug error", display_field: "display error" }"#
        );
        assert_eq!(err_report.kind, ErrorKind::Denied);
    }

    #[test]
    fn kind_identifiers_are_stable() {
        assert_eq!(ErrorKind::AuthenticationFailed.to_string(), "authentication-failed");
        assert_eq!(ErrorKind::RateLimited.to_string(), "rate-limited");
        assert_eq!(ErrorKind::MountPointConflict.to_string(), "mount-point-conflict");
    }
}
