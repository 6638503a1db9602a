use std::collections::{BTreeMap, HashMap};

use http::{Extensions, Method};
use http_body::Limited;
use hyper::Body;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// Credentials presented on ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

/// The normalized request object the pipeline passes between steps.
#[derive(Debug)]
pub struct Request {
    pub id: Uuid,

    pub method: Method,

    pub path: String,

    /// Query parameters, URL-decoded.
    pub query: BTreeMap<String, String>,

    /// JSON body object. Query parameters are merged in during parameter
    /// validation, once the command meta declares their types.
    pub params: Map<String, Value>,

    pub credentials: Option<Credentials>,

    /// Version advertised by the CLI, when present.
    pub client_version: Option<String>,

    pub extensions: Extensions,

    pub headers: HashMap<String, String>,
}

pub const CLI_VERSION_HEADER: &str = "modular-cli-version";

impl Request {
    /// Create an internal logical request from a http request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request carries a malformed authorization
    /// header or a body that is not a JSON object.
    pub async fn new(raw: hyper::Request<Limited<Body>>) -> Result<Self, ApiError> {
        let uri = raw.uri().clone();
        let method = raw.method().clone();

        let credentials = match raw.headers().get(http::header::AUTHORIZATION) {
            Some(value) => Some(parse_authorization(
                value.to_str().map_err(|_| ApiError::unauthorized())?,
            )?),
            None => None,
        };
        let client_version = raw
            .headers()
            .get(CLI_VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let headers = raw
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let query: BTreeMap<String, String> = match uri.query() {
            Some(qs) => serde_qs::from_str(qs).map_err(|_| ApiError::bad_request())?,
            None => BTreeMap::new(),
        };

        let bytes = hyper::body::to_bytes(raw.into_body())
            .await
            .map_err(|_| ApiError::bad_request())?;
        let params = if bytes.is_empty() {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                _ => return Err(ApiError::bad_request()),
            }
        };

        Ok(Self {
            id: Uuid::new_v4(),
            method,
            path: uri.path().to_string(),
            query,
            params,
            credentials,
            client_version,
            extensions: Extensions::new(),
            headers,
        })
    }

    /// Deserialize the request body into a typed parameter struct.
    ///
    /// # Errors
    ///
    /// Returns an error when the body does not have the expected shape.
    pub fn body<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|err| ApiError::new(
                crate::error::ErrorKind::InvalidPayload,
                http::StatusCode::BAD_REQUEST,
                err,
            ))
    }
}

fn parse_authorization(value: &str) -> Result<Credentials, ApiError> {
    if let Some(token) = value.strip_prefix("Bearer ") {
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }
        return Ok(Credentials::Bearer(token.to_string()));
    }
    if let Some(encoded) = value.strip_prefix("Basic ") {
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(|_| ApiError::unauthorized())?;
        let decoded = String::from_utf8(decoded).map_err(|_| ApiError::unauthorized())?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(ApiError::unauthorized)?;
        return Ok(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }
    Err(ApiError::unauthorized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_credentials() {
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            "alice:s3cret",
        );
        let creds = parse_authorization(&format!("Basic {encoded}")).unwrap();
        assert_eq!(
            creds,
            Credentials::Basic {
                username: "alice".into(),
                password: "s3cret".into()
            }
        );
    }

    #[test]
    fn parses_bearer_token() {
        let creds = parse_authorization("Bearer mapi.aa.bb").unwrap();
        assert_eq!(creds, Credentials::Bearer("mapi.aa.bb".into()));
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(parse_authorization("Digest abc").is_err());
        assert!(parse_authorization("Bearer ").is_err());
        assert!(parse_authorization("Basic not-base64!").is_err());
    }
}
