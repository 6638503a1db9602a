use modular_types::{methods::status::HealthCheckResponse, response::Response};

use crate::{
    error::{Error, ErrorType},
    response::SERVER_VERSION,
};

pub fn handle_health_check() -> Result<Response, Error> {
    let resp = HealthCheckResponse {
        status: "ok".to_string(),
        version: SERVER_VERSION.to_string(),
    };
    Response::raw(resp).map_err(|err| ErrorType::BadResponseData(err).into())
}
