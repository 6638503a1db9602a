use modular_types::{methods::module::DescribeResponse, request::Request, response::Response};

use crate::{
    context::Context,
    error::{Error, ErrorType},
    layer::auth_service::Identity,
};

/// The caller-filtered API meta, so clients can render only the commands
/// they may actually invoke.
pub fn handle_meta(ctx: &Context, req: &Request) -> Result<Response, Error> {
    let Some(Identity::User { statements, .. }) = req.extensions.get::<Identity>() else {
        return Err(ErrorType::AuthenticationFailed.into());
    };
    let meta = ctx.registry.catalog().meta(Some(statements.as_slice()), true);
    let resp = DescribeResponse { meta };
    Response::raw(resp).map_err(|err| ErrorType::BadResponseData(err).into())
}
