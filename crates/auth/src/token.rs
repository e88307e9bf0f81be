//! Signing and verifying bearer tokens (HS256 JWT).

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;

use crate::claims::TokenClaims;
use crate::expiry::TokenExpiry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token expiry: {0}")]
    InvalidExpiry(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Produces signed, time-limited tokens.
pub trait TokenSigner: Send + Sync {
    /// Sign `claims`, stamping `exp = iat + expiry`.
    fn sign(&self, claims: &TokenClaims, expiry: &TokenExpiry) -> Result<String, TokenError>;
}

/// Checks a presented token and yields its payload.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// Shared-secret HS256 implementation of both sides.
pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenService").finish_non_exhaustive()
    }
}

impl TokenSigner for Hs256TokenService {
    fn sign(&self, claims: &TokenClaims, expiry: &TokenExpiry) -> Result<String, TokenError> {
        let lifetime = expiry.to_duration()?.num_seconds();
        let exp = claims
            .iat
            .checked_add(lifetime)
            .ok_or_else(|| TokenError::InvalidExpiry("token lifetime is too large".into()))?;

        let mut stamped = claims.clone();
        stamped.exp = Some(exp);

        encode(&Header::new(Algorithm::HS256), &stamped, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl TokenVerifier for Hs256TokenService {
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use iacp_core::UserId;

    fn claims(iat: i64) -> TokenClaims {
        TokenClaims {
            sub: Some(UserId::new(1)),
            username: Some("alice".into()),
            email: None,
            iat,
            exp: None,
        }
    }

    #[test]
    fn sign_then_verify_stamps_exp() {
        let svc = Hs256TokenService::new("secret");
        let now = Utc::now().timestamp();
        let token = svc.sign(&claims(now), &TokenExpiry::parse("30m").unwrap()).unwrap();

        let decoded = svc.verify(&token).unwrap();
        assert_eq!(decoded.sub, Some(UserId::new(1)));
        assert_eq!(decoded.username.as_deref(), Some("alice"));
        assert_eq!(decoded.exp, Some(now + 30 * 60));
    }

    #[test]
    fn other_secret_fails_signature_check() {
        let issuer = Hs256TokenService::new("secret-a");
        let verifier = Hs256TokenService::new("secret-b");
        let token = issuer
            .sign(&claims(Utc::now().timestamp()), &TokenExpiry::parse("1h").unwrap())
            .unwrap();

        assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = Hs256TokenService::new("secret");
        let two_hours_ago = Utc::now().timestamp() - 2 * 60 * 60;
        let token = svc.sign(&claims(two_hours_ago), &TokenExpiry::parse("1h").unwrap()).unwrap();

        assert_eq!(svc.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let svc = Hs256TokenService::new("secret");
        assert!(matches!(svc.verify("not.a.jwt"), Err(TokenError::Malformed(_))));
    }
}
