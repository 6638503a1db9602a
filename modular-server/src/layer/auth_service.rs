use futures::future::BoxFuture;
use modular_types::{
    entity::User,
    error::ApiError,
    policy::Statement,
    request::{Credentials, Request},
};
use tower::{Layer, Service};

use crate::{
    error::{Error, ErrorType},
    response::ResponseWithCtx,
    store::{TokenStore, UserStore},
};

/// Who is making the request, resolved once at the top of the pipeline.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User {
        user: User,
        /// The caller's effective statements: the union over all policies
        /// of all groups the user belongs to.
        statements: Vec<Statement>,
    },
}

impl Identity {
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User { user, .. } => Some(&user.username),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    users: UserStore,
    tokens: TokenStore,
}

impl<S> AuthService<S> {
    pub fn new(inner: S, users: UserStore, tokens: TokenStore) -> Self {
        Self {
            inner,
            users,
            tokens,
        }
    }

    async fn resolve(&self, credentials: &Credentials) -> Result<Identity, Error> {
        let user = match credentials {
            Credentials::Basic { username, password } => {
                self.users.verify_credentials(username, password).await?
            }
            Credentials::Bearer(raw) => {
                let claims = self.tokens.authenticate(raw).await?;
                let Some((user, consistency)) = self.users.lookup(&claims.sub).await? else {
                    return Err(ErrorType::AuthenticationFailed.into());
                };
                if !consistency.is_ok() {
                    tracing::warn!(username = claims.sub, "user record failed integrity check");
                    return Err(ErrorType::AuthenticationFailed.into());
                }
                if user.is_blocked() {
                    return Err(ErrorType::BlockedUser {
                        reason: user.state_reason,
                    }
                    .into());
                }
                user
            }
        };
        let statements = self.users.effective_statements(&user).await?;
        Ok(Identity::User { user, statements })
    }
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = ResponseWithCtx, Error = ApiError>
        + Send
        + Sync
        + Clone
        + 'static,
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

    fn call(&mut self, mut req: Request) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            let identity = match req.credentials.as_ref() {
                Some(credentials) => this.resolve(credentials).await?,
                None => Identity::Anonymous,
            };
            req.extensions.insert(identity);
            this.inner.call(req).await
        })
    }
}

pub struct AuthServiceLayer {
    users: UserStore,
    tokens: TokenStore,
}

impl AuthServiceLayer {
    pub fn new(users: UserStore, tokens: TokenStore) -> Self {
        Self { users, tokens }
    }
}

impl<S> Layer<S> for AuthServiceLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(inner, self.users.clone(), self.tokens.clone())
    }
}
