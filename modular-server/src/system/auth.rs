use modular_types::{
    methods::auth::{LoginResponse, LogoutResponse},
    request::{Credentials, Request},
    response::Response,
};

use crate::{
    context::Context,
    error::{Error, ErrorType},
    layer::auth_service::Identity,
};

/// Exchange credentials for a bearer token plus the catalog filtered for
/// the caller. `?meta=true` keeps the parameter-level API meta.
pub async fn handle_login(ctx: &Context, req: Request) -> Result<Response, Error> {
    let Some(Identity::User { user, statements }) = req.extensions.get::<Identity>() else {
        return Err(ErrorType::AuthenticationFailed.into());
    };

    let (token, expires_at) = ctx.tokens.issue(&user.username).await?;
    let detailed = req.query.get("meta").is_some_and(|v| v == "true");
    let catalog = ctx
        .registry
        .catalog()
        .meta(Some(statements.as_slice()), detailed);

    let resp = LoginResponse {
        token,
        expires_at,
        catalog,
    };
    Response::raw(resp).map_err(|err| ErrorType::BadResponseData(err).into())
}

/// Revoke the presented token.
pub async fn handle_logout(ctx: &Context, req: &Request) -> Result<Response, Error> {
    let Some(Credentials::Bearer(raw)) = req.credentials.as_ref() else {
        return Err(ErrorType::AuthenticationFailed.into());
    };
    let revoked = ctx.tokens.revoke(raw).await?;
    let resp = LogoutResponse { revoked };
    Response::raw(resp).map_err(|err| ErrorType::BadResponseData(err).into())
}
