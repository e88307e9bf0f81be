use std::sync::Arc;

use tracing::{debug, info, instrument};

use iacp_auth::{ClaimConfigPatch, ClaimConfiguration};

use super::{ServiceError, ServiceResult};
use crate::store::{ClaimConfigStore, IdentityStore};

const MISSING_AFTER_CREATE: &str = "claim configuration missing after concurrent create";

/// Reads and updates the singleton claim configuration.
///
/// The row is created lazily with defaults on first access. When two requests
/// race to create it, the loser re-reads the winner's row.
#[derive(Clone)]
pub struct ClaimConfigService {
    store: Arc<dyn IdentityStore>,
}

impl ClaimConfigService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> ServiceResult<ClaimConfiguration> {
        load_or_create(&*self.store).await
    }

    /// Apply only the supplied fields; create the row if it does not exist yet.
    ///
    /// The store writes the supplied columns in one statement, so concurrent
    /// updates of different fields never undo each other.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, patch: &ClaimConfigPatch) -> ServiceResult<ClaimConfiguration> {
        patch.validate()?;

        let next = patch_or_create(&*self.store, patch).await?;
        info!(
            username = next.include_username,
            email = next.include_email,
            user_id = next.include_user_id,
            token_expiry = %next.token_expiry,
            "claim configuration updated"
        );
        Ok(next)
    }
}

async fn load_or_create<S>(store: &S) -> ServiceResult<ClaimConfiguration>
where
    S: ClaimConfigStore + ?Sized,
{
    if let Some(config) = store.load_claim_config().await? {
        return Ok(config);
    }

    let defaults = ClaimConfiguration::default();
    if store.create_claim_config(&defaults).await? {
        info!("claim configuration initialised with defaults");
        return Ok(defaults);
    }

    debug!("claim configuration created by concurrent request");
    store
        .load_claim_config()
        .await?
        .ok_or_else(|| ServiceError::Internal(MISSING_AFTER_CREATE.into()))
}

async fn patch_or_create<S>(store: &S, patch: &ClaimConfigPatch) -> ServiceResult<ClaimConfiguration>
where
    S: ClaimConfigStore + ?Sized,
{
    if let Some(next) = store.patch_claim_config(patch).await? {
        return Ok(next);
    }

    let created = patch.over_defaults();
    if store.create_claim_config(&created).await? {
        info!("claim configuration created");
        return Ok(created);
    }

    debug!("claim configuration created by concurrent request");
    store
        .patch_claim_config(patch)
        .await?
        .ok_or_else(|| ServiceError::Internal(MISSING_AFTER_CREATE.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{InMemoryIdentityStore, StoreError};

    /// Another writer creates the row right after this store's first miss.
    struct RivalCreates {
        inner: InMemoryIdentityStore,
        rival: ClaimConfiguration,
        pending: AtomicBool,
    }

    impl RivalCreates {
        fn new(rival: ClaimConfiguration) -> Self {
            Self {
                inner: InMemoryIdentityStore::new(),
                rival,
                pending: AtomicBool::new(true),
            }
        }

        async fn rival_wins(&self) -> Result<bool, StoreError> {
            if !self.pending.swap(false, Ordering::SeqCst) {
                return Ok(false);
            }
            assert!(self.inner.create_claim_config(&self.rival).await?);
            Ok(true)
        }
    }

    #[async_trait]
    impl ClaimConfigStore for RivalCreates {
        async fn load_claim_config(&self) -> Result<Option<ClaimConfiguration>, StoreError> {
            if self.rival_wins().await? {
                return Ok(None);
            }
            self.inner.load_claim_config().await
        }

        async fn create_claim_config(&self, config: &ClaimConfiguration) -> Result<bool, StoreError> {
            self.inner.create_claim_config(config).await
        }

        async fn patch_claim_config(
            &self,
            patch: &ClaimConfigPatch,
        ) -> Result<Option<ClaimConfiguration>, StoreError> {
            if self.rival_wins().await? {
                return Ok(None);
            }
            self.inner.patch_claim_config(patch).await
        }
    }

    fn rival_config() -> ClaimConfiguration {
        ClaimConfiguration {
            include_username: false,
            token_expiry: "1h".into(),
            ..ClaimConfiguration::default()
        }
    }

    #[tokio::test]
    async fn update_on_empty_store_layers_patch_over_defaults() {
        let svc = ClaimConfigService::new(Arc::new(InMemoryIdentityStore::new()));
        let patch = ClaimConfigPatch {
            include_email: Some(false),
            token_expiry: Some("7d".into()),
            ..Default::default()
        };

        let config = svc.update(&patch).await.unwrap();
        assert!(!config.include_email);
        assert!(config.include_username);
        assert_eq!(config.token_expiry, "7d");
        assert_eq!(svc.get().await.unwrap(), config);
    }

    #[tokio::test]
    async fn invalid_expiry_is_a_validation_error() {
        let svc = ClaimConfigService::new(Arc::new(InMemoryIdentityStore::new()));
        let patch = ClaimConfigPatch {
            token_expiry: Some("1 week".into()),
            ..Default::default()
        };
        assert!(matches!(svc.update(&patch).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn unsignable_expiry_is_rejected_and_not_stored() {
        let svc = ClaimConfigService::new(Arc::new(InMemoryIdentityStore::new()));
        let before = svc.get().await.unwrap();

        let patch = ClaimConfigPatch {
            token_expiry: Some("200000000000d".into()),
            ..Default::default()
        };
        assert!(matches!(svc.update(&patch).await, Err(ServiceError::Validation(_))));
        assert_eq!(svc.get().await.unwrap(), before);
    }

    #[tokio::test]
    async fn get_returns_the_row_a_rival_created_first() {
        let store = RivalCreates::new(rival_config());

        let config = load_or_create(&store).await.unwrap();
        assert_eq!(config, rival_config());
        assert_eq!(store.inner.load_claim_config().await.unwrap(), Some(rival_config()));
    }

    #[tokio::test]
    async fn update_patches_the_row_a_rival_created_first() {
        let store = RivalCreates::new(rival_config());
        let patch = ClaimConfigPatch {
            include_email: Some(false),
            ..Default::default()
        };

        let config = patch_or_create(&store, &patch).await.unwrap();
        assert!(!config.include_email);
        assert!(!config.include_username);
        assert_eq!(config.token_expiry, "1h");
    }
}
