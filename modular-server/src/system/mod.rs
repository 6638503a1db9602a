mod auth;
mod meta;
mod status;
mod swagger;

use hyper::Method;
use modular_types::{request::Request, response::Response};

use crate::{context::Context, error::Error};

/// Routes handled by the facade itself rather than forwarded to a module
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRoute {
    Login,
    Logout,
    HealthCheck,
    Meta,
    Swagger,
}

#[must_use]
pub fn resolve(method: &Method, path: &str) -> Option<SystemRoute> {
    match path {
        "/login" if *method == Method::POST => Some(SystemRoute::Login),
        "/logout" if *method == Method::POST => Some(SystemRoute::Logout),
        "/health_check" if *method == Method::GET => Some(SystemRoute::HealthCheck),
        "/meta" if *method == Method::GET => Some(SystemRoute::Meta),
        "/swagger.json" if *method == Method::GET => Some(SystemRoute::Swagger),
        _ => None,
    }
}

pub async fn handle(ctx: &Context, route: SystemRoute, req: Request) -> Result<Response, Error> {
    match route {
        SystemRoute::Login => auth::handle_login(ctx, req).await,
        SystemRoute::Logout => auth::handle_logout(ctx, &req).await,
        SystemRoute::HealthCheck => status::handle_health_check(),
        SystemRoute::Meta => meta::handle_meta(ctx, &req),
        SystemRoute::Swagger => swagger::handle_swagger(ctx),
    }
}
