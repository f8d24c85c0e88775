//! Bearer token verification.
//!
//! Customers sign in elsewhere and receive an HS256 JWT whose claims carry
//! their `userId`. The storefront only verifies those tokens; it never
//! issues them.

mod error;

pub use error::AuthError;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use printshop_core::UserId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Claims carried by customer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Verifies customer bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key", &"[REDACTED]")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl TokenVerifier {
    /// Create a verifier for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Verify a raw token and return the user it identifies.
    ///
    /// # Errors
    ///
    /// [`AuthError::Expired`] for expired tokens, [`AuthError::InvalidToken`]
    /// for everything else that fails verification.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims.user_id)
    }

    /// Verify an `Authorization` header value of the form `Bearer <token>`.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingToken`] if the scheme is not `Bearer`, otherwise
    /// as [`TokenVerifier::verify`].
    pub fn verify_header(&self, header: &str) -> Result<UserId, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "q8F!t2Lz#9vR@c4Wm$7nK0pY^s3Xb6Hj";

    fn token(user: i32, exp_offset: i64, secret: &str) -> String {
        let claims = Claims {
            user_id: UserId::new(user),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(&SecretString::from(SECRET))
    }

    #[test]
    fn test_valid_token() {
        let user = verifier().verify(&token(42, 3600, SECRET)).unwrap();
        assert_eq!(user, UserId::new(42));
    }

    #[test]
    fn test_header_parsing() {
        let v = verifier();
        let header = format!("Bearer {}", token(7, 3600, SECRET));
        assert_eq!(v.verify_header(&header).unwrap(), UserId::new(7));
        assert_eq!(v.verify_header("Basic abc"), Err(AuthError::MissingToken));
        assert_eq!(v.verify_header("Bearer "), Err(AuthError::MissingToken));
    }

    #[test]
    fn test_expired_token() {
        assert_eq!(
            verifier().verify(&token(1, -60, SECRET)),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let forged = token(1, 3600, "another-Secret-0f-32-characters!!");
        assert!(matches!(
            verifier().verify(&forged),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            verifier().verify("not.a.jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
