use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use hyper::{Method, StatusCode};
use modular_types::{
    audit::AuditRecord,
    entity::User,
    error::ApiError,
    module::AuthMode,
    policy::{evaluate, Decision},
    request::Request,
    response::Response,
};
use serde_json::{Map, Value};
use tower::Service;
use uuid::Uuid;

use crate::{
    context::Context,
    error::{Error, ErrorType},
    layer::auth_service::Identity,
    registry::CommandMeta,
    response::{ResponseContext, ResponseWithCtx},
    restrictions::apply_restrictions,
    system,
    validate::normalize_params,
};

pub const SERVICE_TOKEN_HEADER: &str = "modular-service-token";

/// The request pipeline: route lookup, authorization, parameter validation
/// and restriction, backend forward, audit.
pub struct Dispatcher {
    ctx: Context,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            method = %req.method,
            path = req.path
        )
    )]
    pub async fn route(&self, req: Request) -> Result<ResponseWithCtx, ApiError> {
        let request_id = req.id;
        self.route_inner(req)
            .await
            .map(|response| ResponseWithCtx {
                response,
                ctx: ResponseContext { request_id },
            })
            .map_err(Into::into)
    }

    async fn route_inner(&self, mut req: Request) -> Result<Response, Error> {
        if let Some(route) = system::resolve(&req.method, &req.path) {
            return system::handle(&self.ctx, route, req).await;
        }

        let catalog = self.ctx.registry.catalog();
        let Some(meta) = catalog.lookup(&req.method, &req.path) else {
            return Err(ErrorType::NoSuchRoute {
                method: req.method.to_string(),
                path: req.path.clone(),
            }
            .into());
        };

        let identity = req
            .extensions
            .remove::<Identity>()
            .unwrap_or(Identity::Anonymous);
        let user = match (identity, meta.spec.route.auth) {
            // Routes declared `auth: none` are public; no policy applies.
            (Identity::User { user, .. }, AuthMode::None) => Some(user),
            (Identity::User { user, statements }, AuthMode::Required) => {
                match evaluate(&statements, &meta.module, &meta.command_path) {
                    Decision::Allow { .. } => {}
                    Decision::Deny { statement } => {
                        return Err(ErrorType::Denied {
                            module: meta.module.clone(),
                            command: meta.command_name(),
                            statement,
                        }
                        .into());
                    }
                }
                Some(user)
            }
            (Identity::Anonymous, AuthMode::None) => None,
            (Identity::Anonymous, AuthMode::Required) => {
                return Err(ErrorType::AuthenticationFailed.into());
            }
        };

        let mut params = normalize_params(&meta, &req.query, &req.params)?;
        if let Some(user) = user.as_ref() {
            apply_restrictions(&user.meta, &mut params)?;
        }

        let (status, body) = self.forward(&meta, user.as_ref(), &params, req.id).await?;

        if !meta.spec.describe && status.is_success() {
            self.ctx
                .audit
                .append(AuditRecord {
                    group: meta.module.clone(),
                    command: meta.command_name(),
                    parameters: Value::Object(params),
                    result: format!("succeeded ({status})"),
                    warnings: vec![],
                    timestamp: Utc::now(),
                })
                .await?;
        }

        Ok(Response::Proxied { status, body })
    }

    /// Forward the call to the backend route declared by the command meta.
    /// The backend's body and status pass through unmodified.
    async fn forward(
        &self,
        meta: &CommandMeta,
        user: Option<&User>,
        params: &Map<String, Value>,
        request_id: Uuid,
    ) -> Result<(StatusCode, Value), Error> {
        let url = format!("{}{}", meta.service_url, meta.spec.route.path);
        let mut builder = self
            .ctx
            .http
            .request(meta.spec.route.method.clone(), &url)
            .timeout(self.ctx.config.upstream_timeout())
            .header(crate::response::REQUEST_ID_HEADER, request_id.to_string());

        if let Some(user) = user {
            if let Some(token) = self.ctx.tokens.service_token(&user.username) {
                builder = builder.header(SERVICE_TOKEN_HEADER, token.to_string());
            }
        }

        builder = if meta.spec.route.method == Method::GET {
            builder.query(&to_query(params))
        } else {
            builder.json(params)
        };

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                Error::from(ErrorType::UpstreamTimeout {
                    timeout_secs: self.ctx.config.upstream_timeout_secs,
                })
            } else {
                Error::from(ErrorType::UpstreamError { source: err })
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ErrorType::UpstreamError { source: err })?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, body))
    }
}

/// Query-string rendering of the normalized parameters for GET forwards.
fn to_query(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(name, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            (name.clone(), rendered)
        })
        .collect()
}

#[derive(Clone)]
pub struct DispatcherService(Arc<Dispatcher>);

impl DispatcherService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self(dispatcher)
    }
}

impl Service<Request> for DispatcherService {
    type Response = ResponseWithCtx;

    type Error = ApiError;

    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let dispatcher = self.0.clone();
        Box::pin(async move { dispatcher.route(req).await })
    }
}
