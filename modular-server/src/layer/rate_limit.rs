use chrono::Utc;
use futures::future::BoxFuture;
use modular_types::{error::ApiError, request::Request};
use tower::{Layer, Service};

use crate::{
    error::{Error, ErrorType},
    layer::auth_service::Identity,
    repos::usage::UsageRepo,
    response::ResponseWithCtx,
};

/// Fixed-window counter per (username, route, second), shared across
/// workers through the document store. The window may overshoot the
/// ceiling by one near a second boundary, an accepted tradeoff for the
/// lock-free design.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    usage: UsageRepo,
    calls_per_second: Option<u32>,
}

impl<S> RateLimitService<S> {
    pub fn new(inner: S, usage: UsageRepo, calls_per_second: Option<u32>) -> Self {
        Self {
            inner,
            usage,
            calls_per_second,
        }
    }
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = ResponseWithCtx, Error = ApiError> + Send + Clone + 'static,
    S::Future: Send,
{
    type Response = ResponseWithCtx;

    type Error = ApiError;

    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            if let Some(limit) = this.calls_per_second {
                let username = req
                    .extensions
                    .get::<Identity>()
                    .and_then(Identity::username)
                    .map(ToString::to_string);
                if let Some(username) = username {
                    let window = Utc::now().timestamp();
                    let count = this
                        .usage
                        .increment(&username, &req.path, window)
                        .await
                        .map_err(ApiError::from)?;
                    if count > i64::from(limit) {
                        return Err(Error::from(ErrorType::RateLimited {
                            retry_after_secs: 1,
                        })
                        .into());
                    }
                }
            }
            this.inner.call(req).await
        })
    }
}

pub struct RateLimitLayer {
    usage: UsageRepo,
    calls_per_second: Option<u32>,
}

impl RateLimitLayer {
    pub fn new(usage: UsageRepo, calls_per_second: Option<u32>) -> Self {
        Self {
            usage,
            calls_per_second,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService::new(inner, self.usage.clone(), self.calls_per_second)
    }
}
