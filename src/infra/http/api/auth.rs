use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized,
    Rejected,
    NotConfigured,
}

/// Shared bearer token check. Only the SHA-256 digest of the configured
/// token is kept; presented tokens are hashed and compared in constant time.
#[derive(Debug, Clone, Default)]
pub struct BearerAuth {
    digest: Option<Vec<u8>>,
}

impl BearerAuth {
    pub fn new(token: Option<&SecretString>) -> Self {
        Self {
            digest: token.map(|token| hash_token(token.expose_secret())),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.digest.is_some()
    }

    /// Check an `Authorization` header value.
    pub fn verify(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some(expected) = self.digest.as_deref() else {
            return AuthOutcome::NotConfigured;
        };

        let presented = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty());
        match presented {
            Some(token) if bool::from(hash_token(token).ct_eq(expected)) => AuthOutcome::Authorized,
            _ => AuthOutcome::Rejected,
        }
    }
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
