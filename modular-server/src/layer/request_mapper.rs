use std::convert::Infallible;

use futures::future::BoxFuture;
use http_body::Limited;
use hyper::{http, Body};
use modular_types::{error::ApiError, request::Request};
use tower::{Layer, Service, ServiceExt};

use crate::response::{ResponseWithCtx, REQUEST_ID_HEADER, SERVER_VERSION, SERVER_VERSION_HEADER};

/// Maps the raw http request into the normalized [`Request`] the pipeline
/// operates on and translates typed errors into http responses exactly
/// once, at this boundary.
#[derive(Debug, Clone)]
pub struct RequestMapperService<S> {
    inner: S,
}

impl<S> RequestMapperService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Service<http::Request<Limited<Body>>> for RequestMapperService<S>
where
    S: Service<Request, Response = ResponseWithCtx, Error = ApiError> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = http::Response<Body>;

    type Error = Infallible;

    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Limited<Body>>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let logical_req = match Request::new(req).await {
                Ok(req) => req,
                Err(e) => return Ok(hyper::Response::from(e)),
            };
            let request_id = logical_req.id;
            let mut response: hyper::Response<Body> =
                match this.inner.oneshot(logical_req).await {
                    Ok(resp) => resp.into(),
                    Err(error) => {
                        let error_report = error.report();
                        tracing::error!(?error_report, %request_id, "API error encountered");
                        error.into()
                    }
                };
            let headers = response.headers_mut();
            if !headers.contains_key(REQUEST_ID_HEADER) {
                if let Ok(value) = request_id.to_string().parse() {
                    headers.insert(REQUEST_ID_HEADER, value);
                }
            }
            if !headers.contains_key(SERVER_VERSION_HEADER) {
                if let Ok(value) = SERVER_VERSION.parse() {
                    headers.insert(SERVER_VERSION_HEADER, value);
                }
            }
            Ok(response)
        })
    }
}

pub struct RequestMapperLayer {}

impl RequestMapperLayer {
    pub fn new() -> Self {
        Self {}
    }
}

impl<S> Layer<S> for RequestMapperLayer {
    type Service = RequestMapperService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMapperService::new(inner)
    }
}
