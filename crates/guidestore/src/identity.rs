//! Bearer identity verification.
//!
//! User authentication is owned by an external provider; this module only
//! consumes its contract: a bearer token that resolves to a user id and
//! email. The default implementation verifies HS256 tokens signed with the
//! store secret.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use guidestore_core::error::StoreError;

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Resolves bearer tokens into identities. `Ok(None)` means the token is
/// invalid or expired; errors are reserved for provider failures.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    async fn verify(&self, bearer_token: &str) -> Result<Option<Identity>, StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityClaims {
    sub: String,
    email: String,
    iat: u64,
    exp: u64,
}

/// HS256 identity tokens signed with a shared secret.
#[derive(Debug, Clone)]
pub struct JwtIdentityProvider {
    secret: String,
}

impl JwtIdentityProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for the given identity. Used by tests and tooling; the
    /// production issuer is the external auth provider holding the same
    /// secret.
    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        expires_in_secs: u64,
    ) -> Result<String, StoreError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = IdentityClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + expires_in_secs,
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| StoreError::Config(format!("identity token signing failed: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, bearer_token: &str) -> Result<Option<Identity>, StoreError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        match jsonwebtoken::decode::<IdentityClaims>(bearer_token, &key, &validation) {
            Ok(data) => Ok(Some(Identity {
                user_id: data.claims.sub,
                email: data.claims.email,
            })),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issue_and_verify() {
        let provider = JwtIdentityProvider::new("a-secret-of-at-least-32-characters!!");
        let token = provider.issue("user_123", "a@example.com", 3600).unwrap();

        let identity = provider.verify(&token).await.unwrap().unwrap();
        assert_eq!(identity.user_id, "user_123");
        assert_eq!(identity.email, "a@example.com");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let signer = JwtIdentityProvider::new("correct-secret-that-is-long-enough!");
        let verifier = JwtIdentityProvider::new("different-secret-that-is-long-too!");
        let token = signer.issue("user_123", "a@example.com", 3600).unwrap();

        assert!(verifier.verify(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let provider = JwtIdentityProvider::new("a-secret-of-at-least-32-characters!!");
        assert!(provider.verify("not-a-token").await.unwrap().is_none());
    }
}
