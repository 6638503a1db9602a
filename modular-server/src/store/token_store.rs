use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use modular_types::token::{Token, TokenClaims};

use crate::{
    error::{Error, ErrorType},
    repos::{token::TokenEntry, Repos},
};

/// Hard cap on the lifetime of a bearer token, bounding the blast radius
/// of a leaked one.
pub const MAX_TOKEN_TTL_HOURS: i64 = 8;

/// Issues, validates and revokes bearer tokens. Tokens are signed with the
/// server key and allowlisted server-side; both checks must pass.
#[derive(Clone)]
pub struct TokenStore {
    repos: Repos,
    key: Arc<Vec<u8>>,
}

impl TokenStore {
    #[must_use]
    pub fn new(repos: Repos, key: &[u8]) -> Self {
        Self {
            repos,
            key: Arc::new(key.to_vec()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, username: &str) -> Result<(Token, DateTime<Utc>), Error> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: now,
        };
        let token =
            Token::issue(&self.key, &claims).map_err(|_| ErrorType::AuthenticationFailed)?;
        let expires_at = now + Duration::hours(MAX_TOKEN_TTL_HOURS);
        self.repos
            .token
            .create(&TokenEntry {
                token: token.to_string(),
                username: username.to_string(),
                issued_at: now,
                expires_at,
            })
            .await?;
        Ok((token, expires_at))
    }

    /// Validate a presented token. A well-formed signature is not enough:
    /// the token must also still be on the server-side allowlist.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, raw: &str) -> Result<TokenClaims, Error> {
        let token: Token = raw.parse().map_err(|_| ErrorType::AuthenticationFailed)?;
        let claims = token
            .verify(&self.key)
            .map_err(|_| ErrorType::AuthenticationFailed)?;

        let entry = self
            .repos
            .token
            .lookup_active(raw, Utc::now())
            .await?
            .ok_or(ErrorType::TokenRevoked)?;
        if entry.username != claims.sub {
            tracing::warn!("token subject does not match allowlist entry");
            return Err(ErrorType::TokenRevoked.into());
        }
        Ok(claims)
    }

    #[tracing::instrument(skip_all)]
    pub async fn revoke(&self, raw: &str) -> Result<bool, Error> {
        self.repos.token.remove(raw).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_all(&self, username: &str) -> Result<u64, Error> {
        self.repos.token.remove_all(username).await
    }

    /// Short-lived signed token handed to backends so they can trust the
    /// caller's identity without another credential exchange. Deliberately
    /// not allowlisted.
    #[must_use]
    pub fn service_token(&self, username: &str) -> Option<Token> {
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: Utc::now(),
        };
        Token::issue(&self.key, &claims).ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::repos::tests::repos;

    use super::*;

    async fn store() -> TokenStore {
        TokenStore::new(repos().await, b"test-secret-key!")
    }

    #[tokio::test]
    async fn issue_then_authenticate() {
        let store = store().await;
        let (token, expires_at) = store.issue("alice").await.unwrap();
        assert!(expires_at > Utc::now());

        let claims = store.authenticate(&token.to_string()).await.unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_even_when_well_formed() {
        let store = store().await;
        let (token, _) = store.issue("dave").await.unwrap();
        let raw = token.to_string();

        assert!(store.revoke(&raw).await.unwrap());
        let err = store.authenticate(&raw).await.unwrap_err();
        assert!(matches!(err.variant, ErrorType::TokenRevoked));
    }

    #[tokio::test]
    async fn revoke_all_invalidates_every_token() {
        let store = store().await;
        let (first, _) = store.issue("dave").await.unwrap();
        let (second, _) = store.issue("dave").await.unwrap();

        assert_eq!(store.revoke_all("dave").await.unwrap(), 2);
        assert!(store.authenticate(&first.to_string()).await.is_err());
        assert!(store.authenticate(&second.to_string()).await.is_err());
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let store = store().await;
        let foreign = TokenStore::new(store.repos.clone(), b"some-other-key!!")
            .service_token("alice")
            .unwrap();
        assert!(store.authenticate(&foreign.to_string()).await.is_err());
    }
}
