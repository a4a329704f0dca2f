//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued by the account service. The storefront only
//! verifies them.

mod error;

pub use error::AuthError;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mercato_core::{AccountRole, OwnerId};

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub role: AccountRole,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: OwnerId,
    pub role: AccountRole,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

/// Verifies bearer tokens against the shared HS256 key.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Decode and validate a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for expired tokens,
    /// `AuthError::InvalidSubject` if `sub` is not a UUID, and
    /// `AuthError::InvalidToken` for anything else wrong with it.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        let owner_id = data
            .claims
            .sub
            .parse::<OwnerId>()
            .map_err(|_| AuthError::InvalidSubject(data.claims.sub.clone()))?;

        Ok(Principal {
            owner_id,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const KEY: &str = "k9#Qz!4mT@1vX$7pL2&wR8^bN5*cY3%h";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SecretString::from(KEY))
    }

    fn mint(key: &str, sub: &str, role: AccountRole, ttl_secs: i64) -> String {
        let claims = Claims {
            sub: sub.to_owned(),
            role,
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let owner = OwnerId::generate();
        let token = mint(KEY, &owner.to_string(), AccountRole::Admin, 3600);
        let principal = verifier().verify(&token).unwrap();
        assert_eq!(principal.owner_id, owner);
        assert!(principal.is_admin());
    }

    #[test]
    fn test_expired_token() {
        let token = mint(KEY, &OwnerId::generate().to_string(), AccountRole::Customer, -3600);
        assert_eq!(verifier().verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_wrong_key() {
        let token = mint(
            "another-key-another-key-another-k",
            &OwnerId::generate().to_string(),
            AccountRole::Customer,
            3600,
        );
        assert_eq!(verifier().verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_subject_must_be_account_id() {
        let token = mint(KEY, "alice", AccountRole::Customer, 3600);
        assert_eq!(
            verifier().verify(&token),
            Err(AuthError::InvalidSubject("alice".to_owned()))
        );
    }

    #[test]
    fn test_garbage_token() {
        assert_eq!(verifier().verify("not.a.jwt"), Err(AuthError::InvalidToken));
    }
}
