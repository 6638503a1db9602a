use modular_types::request::CLI_VERSION_HEADER;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, Deserialize)]
pub struct Response<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) struct BaseClient {
    api_url: String,
    token: RwLock<Option<String>>,
    http: reqwest::Client,
}

impl BaseClient {
    pub fn new(api_url: impl ToString) -> Self {
        let mut api_url = api_url.to_string();
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            api_url,
            token: RwLock::new(None),
            http: reqwest::Client::new(),
        }
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn prepare(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb.header(CLI_VERSION_HEADER, CLIENT_VERSION);
        match self.token.read().await.as_ref() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Unwrap the `{data, error}` envelope system responses arrive in.
    pub async fn send<T: for<'de> serde::de::Deserialize<'de>>(
        rb: RequestBuilder,
    ) -> Result<T, String> {
        rb.send()
            .await
            .map_err(|e| format!("{e:#?}"))?
            .json::<Response<T>>()
            .await
            .map_err(|e| format!("{e:#?}"))
            .and_then(|res| {
                if let Some(data) = res.data {
                    Ok(data)
                } else if let Some(err) = res.error {
                    Err(err)
                } else {
                    Err("Unexpected empty response from server".into())
                }
            })
    }

    pub async fn get<T: for<'de> serde::de::Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, String> {
        let rb = self.prepare(self.http.get(self.url(path))).await;
        Self::send(rb).await
    }

    pub async fn post<T: Serialize, U: for<'de> serde::de::Deserialize<'de>>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<U, String> {
        let rb = self.prepare(self.http.post(self.url(path)).json(body)).await;
        Self::send(rb).await
    }

    /// POST with basic credentials instead of the stored bearer token.
    pub async fn post_basic<T: for<'de> serde::de::Deserialize<'de>>(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<T, String> {
        let rb = self
            .http
            .post(self.url(path))
            .header(CLI_VERSION_HEADER, CLIENT_VERSION)
            .basic_auth(username, Some(password));
        Self::send(rb).await
    }

    /// Raw dispatch for module commands: the facade forwards the backend's
    /// body and status unmodified, so no envelope is assumed.
    pub async fn dispatch(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), String> {
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| format!("invalid method `{method}`"))?;
        let mut rb = self.http.request(method, self.url(path)).query(query);
        if let Some(body) = body {
            rb = rb.json(body);
        }
        let response = self
            .prepare(rb)
            .await
            .send()
            .await
            .map_err(|e| format!("{e:#?}"))?;
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);
        Ok((status, body))
    }
}
