use std::str::FromStr;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ApiError;

const TOKEN_PREFIX: &str = "mapi";

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username the token was issued to.
    pub sub: String,
    /// Time of issuance.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,
}

/// A signed bearer token: `mapi.<claims-hex>.<signature-hex>`.
///
/// The signature alone never authorizes a request. Tokens are additionally
/// kept in a server-side allowlist, and a token missing from the allowlist
/// is rejected even when cryptographically well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token(String);

impl FromStr for Token {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(TOKEN_PREFIX), Some(payload), Some(signature), None)
                if !payload.is_empty() && !signature.is_empty() =>
            {
                Ok(Self(s.to_string()))
            }
            _ => Err(ApiError::unauthorized()),
        }
    }
}

fn sign_bytes(key: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

impl Token {
    /// Issue a new token for the given claims under the server key.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue(key: &[u8], claims: &TokenClaims) -> Result<Self, ApiError> {
        let payload = serde_json::to_vec(claims).map_err(|_| ApiError::internal_error())?;
        let signature = sign_bytes(key, &payload);
        Ok(Self(format!(
            "{TOKEN_PREFIX}.{}.{}",
            hex::encode(payload),
            hex::encode(signature)
        )))
    }

    /// Verify the signature under the server key and return the claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or the signature does not
    /// match.
    pub fn verify(&self, key: &[u8]) -> Result<TokenClaims, ApiError> {
        let mut parts = self.0.split('.');
        let (payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(TOKEN_PREFIX), Some(payload), Some(signature), None) => (payload, signature),
            _ => return Err(ApiError::unauthorized()),
        };
        let payload = hex::decode(payload).map_err(|_| ApiError::unauthorized())?;
        let signature = hex::decode(signature).map_err(|_| ApiError::unauthorized())?;

        let expected = sign_bytes(key, &payload);
        if expected.ct_eq(&signature).unwrap_u8() != 1 {
            return Err(ApiError::unauthorized());
        }
        serde_json::from_slice(&payload).map_err(|_| ApiError::unauthorized())
    }

    // Not using the ToString/Display trait to prevent accidental leaks
    #[allow(clippy::inherent_to_string)]
    #[must_use]
    pub fn to_string(&self) -> String {
        self.0.clone()
    }
}
