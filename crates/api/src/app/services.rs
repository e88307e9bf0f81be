//! Service wiring: store selection and the services shared by every handler.

use std::sync::Arc;

use anyhow::Context;

use iacp_infra::{
    AccountService, ClaimConfigService, GraphService, IdentityStore, InMemoryIdentityStore,
    PostgresIdentityStore, TokenIssuer,
};

use crate::config::ApiConfig;

/// Handles to every service, shared across handlers via `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: AccountService,
    pub claim_config: ClaimConfigService,
    pub tokens: TokenIssuer,
    pub graph: GraphService,
}

impl AppServices {
    /// Wire every service over one store, signing tokens with `jwt_secret`.
    pub fn new(store: Arc<dyn IdentityStore>, jwt_secret: &str) -> Self {
        let claim_config = ClaimConfigService::new(store.clone());
        Self {
            accounts: AccountService::new(store.clone()),
            tokens: TokenIssuer::hs256(claim_config.clone(), jwt_secret),
            claim_config,
            graph: GraphService::new(store),
        }
    }
}

/// Postgres when a database URL is configured, in-memory otherwise.
pub async fn build_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn IdentityStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("no database configured; using in-memory store (data is lost on restart)");
        return Ok(Arc::new(InMemoryIdentityStore::new()));
    };

    let store = PostgresIdentityStore::connect(url, config.max_connections)
        .await
        .context("failed to connect to Postgres")?;
    store
        .ensure_schema()
        .await
        .context("failed to apply database schema")?;
    tracing::info!(max_connections = config.max_connections, "connected to Postgres");

    Ok(Arc::new(store))
}
