use futures::future::BoxFuture;
use modular_types::{error::ApiError, request::Request};
use semver::Version;
use tower::{Layer, Service};

use crate::{
    error::{Error, ErrorType},
    response::ResponseWithCtx,
};

/// Rejects clients advertising a CLI version below the minimum supported
/// one. Requests without an advertised version pass through.
#[derive(Clone)]
pub struct VersionGateService<S> {
    inner: S,
    min_version: Option<Version>,
}

impl<S> VersionGateService<S> {
    pub fn new(inner: S, min_version: Option<Version>) -> Self {
        Self { inner, min_version }
    }
}

impl<S> Service<Request> for VersionGateService<S>
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
            if let (Some(minimum), Some(advertised)) =
                (this.min_version.as_ref(), req.client_version.as_deref())
            {
                let below = match Version::parse(advertised) {
                    Ok(version) => version < *minimum,
                    Err(_) => true,
                };
                if below {
                    return Err(Error::from(ErrorType::UnsupportedClientVersion {
                        advertised: advertised.to_string(),
                        minimum: minimum.to_string(),
                    })
                    .into());
                }
            }
            this.inner.call(req).await
        })
    }
}

pub struct VersionGateLayer {
    min_version: Option<Version>,
}

impl VersionGateLayer {
    pub fn new(min_version: Option<Version>) -> Self {
        Self { min_version }
    }
}

impl<S> Layer<S> for VersionGateLayer {
    type Service = VersionGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VersionGateService::new(inner, self.min_version.clone())
    }
}
