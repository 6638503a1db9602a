use std::sync::Arc;

use hmac::{Hmac, Mac};
use modular_types::audit::ConsistencyStatus;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes and verifies the keyed fingerprint stored next to every
/// persisted identity and audit record. The fingerprint covers the
/// canonical JSON body of the record (stable struct field order, UTF-8).
#[derive(Clone)]
pub struct IntegrityService {
    key: Arc<Vec<u8>>,
}

impl IntegrityService {
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: Arc::new(key.to_vec()),
        }
    }

    #[must_use]
    pub fn fingerprint(&self, body: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[must_use]
    pub fn verify(&self, body: &str, stored_hash: &str) -> ConsistencyStatus {
        let expected = self.fingerprint(body);
        if expected.as_bytes().ct_eq(stored_hash.as_bytes()).unwrap_u8() == 1 {
            ConsistencyStatus::Ok
        } else {
            ConsistencyStatus::Compromised
        }
    }
}
