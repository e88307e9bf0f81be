use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use iacp_auth::{
    Hs256TokenService, TokenClaims, TokenExpiry, TokenSigner, TokenVerifier, build_payload,
};
use iacp_core::User;

use super::{ClaimConfigService, ServiceError, ServiceResult};

/// Issues tokens shaped by the current claim configuration and verifies
/// presented ones.
#[derive(Clone)]
pub struct TokenIssuer {
    claim_config: ClaimConfigService,
    signer: Arc<dyn TokenSigner>,
    verifier: Arc<dyn TokenVerifier>,
}

impl TokenIssuer {
    pub fn new(
        claim_config: ClaimConfigService,
        signer: Arc<dyn TokenSigner>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            claim_config,
            signer,
            verifier,
        }
    }

    /// Shared-secret HS256 issuer.
    pub fn hs256(claim_config: ClaimConfigService, secret: impl AsRef<[u8]>) -> Self {
        let service = Arc::new(Hs256TokenService::new(secret));
        Self::new(claim_config, service.clone(), service)
    }

    /// Sign a token for `user` with the claims and lifetime configured right now.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn issue_for(&self, user: &User) -> ServiceResult<String> {
        let config = self.claim_config.get().await?;
        let expiry = TokenExpiry::parse(&config.token_expiry)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let claims = build_payload(user, &config, Utc::now());
        let token = self
            .signer
            .sign(&claims, &expiry)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        debug!(token_expiry = %config.token_expiry, "issued token");
        Ok(token)
    }

    /// Check signature and expiry, returning the payload.
    pub fn verify(&self, token: &str) -> ServiceResult<TokenClaims> {
        Ok(self.verifier.verify(token)?)
    }
}
