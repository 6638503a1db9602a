use hyper::{header::CONTENT_TYPE, Body, StatusCode};
use modular_types::response::Response;
use serde_json::json;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SERVER_VERSION_HEADER: &str = "modular-api-version";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct ResponseContext {
    pub request_id: Uuid,
}

pub struct ResponseWithCtx {
    pub response: Response,
    pub ctx: ResponseContext,
}

impl From<ResponseWithCtx> for hyper::Response<Body> {
    fn from(resp: ResponseWithCtx) -> Self {
        let (status, body) = match resp.response {
            Response::Raw(data) => (StatusCode::OK, json!({ "data": data })),
            // Backend responses pass through with their own status and body.
            Response::Proxied { status, body } => (status, body),
        };
        let body = serde_json::to_vec(&body).unwrap_or_default();
        hyper::Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, resp.ctx.request_id.to_string())
            .header(SERVER_VERSION_HEADER, SERVER_VERSION)
            .body(body.into())
            .unwrap_or_default()
    }
}
