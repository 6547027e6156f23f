//! Session token issuance and verification (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // Account id (hex ObjectId)
    pub iat: i64,
    pub exp: i64,
}

/// Why a token failed verification. Only used to pick the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token binding `account_id` until the configured lifetime elapses.
    pub fn issue(&self, account_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Check signature and expiry, telling expired tokens apart from bad ones.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Best-effort check: the account id, or `None` for any invalid token.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.decode(token).ok().map(|claims| claims.sub)
    }
}

/// A JWT has exactly three non-empty, dot-separated segments.
pub fn is_well_formed(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-0001";

    #[test]
    fn issue_then_verify_recovers_account_id() {
        let tokens = TokenService::new(SECRET, Duration::days(7));
        let token = tokens.issue("64b000000000000000000001").unwrap();

        assert!(is_well_formed(&token));
        assert_eq!(
            tokens.verify(&token).as_deref(),
            Some("64b000000000000000000001")
        );
    }

    #[test]
    fn expired_token_is_classified_as_expired() {
        let tokens = TokenService::new(SECRET, Duration::seconds(-30));
        let token = tokens.issue("abc").unwrap();

        assert_eq!(tokens.decode(&token), Err(TokenError::Expired));
        assert_eq!(tokens.verify(&token), None);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let issuer = TokenService::new("another-secret-which-is-long-enough!", Duration::days(1));
        let verifier = TokenService::new(SECRET, Duration::days(1));
        let token = issuer.issue("abc").unwrap();

        assert_eq!(verifier.decode(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_with_token_shape_is_invalid_every_time() {
        let tokens = TokenService::new(SECRET, Duration::days(1));
        for _ in 0..3 {
            assert_eq!(tokens.decode("a.b.c"), Err(TokenError::Invalid));
        }
    }

    #[test]
    fn structural_check() {
        assert!(is_well_formed("a.b.c"));
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed("a.b"));
        assert!(!is_well_formed("a..c"));
        assert!(!is_well_formed("a.b.c.d"));
        assert!(!is_well_formed(""));
    }
}
