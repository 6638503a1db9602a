use http::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Response produced by the dispatcher.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// Response from a system handler. Returned to the client wrapped as
    /// `{"data": ...}`.
    Raw(Value),
    /// Backend response forwarded unmodified: body and status code pass
    /// through as is.
    Proxied { status: StatusCode, body: Value },
}

impl Response {
    #[must_use]
    pub fn ok() -> Self {
        Self::Raw(Value::default())
    }

    /// Construct a system response from a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns an error if it fails to serialize the payload.
    pub fn raw<T: Serialize>(data: T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Self::Raw)
    }

    /// Try to deserialize the raw data payload from the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be deserialized or the
    /// response is a backend passthrough.
    pub fn data<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Response::Raw(data) => {
                serde_json::from_value(data).map_err(|_| ApiError::internal_error())
            }
            Response::Proxied { .. } => Err(ApiError::internal_error()),
        }
    }
}
