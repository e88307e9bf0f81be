//! Integration tests across services and the in-memory store.
//!
//! Tests: accounts → claim configuration → token issuance → authorization graph
//!
//! Verifies:
//! - Registration conflicts and the uniform login rejection
//! - Idempotent assignment and not-found unassignment
//! - Cascading deletes leave no orphaned bindings
//! - Token claims follow the claim configuration
//! - User → applications → roles resolution keeps application order

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde_json::Value;

    use iacp_auth::{ClaimConfigPatch, ClaimConfiguration};

    use crate::services::accounts::LOGIN_REJECTED;
    use crate::services::{
        AccountService, ClaimConfigService, GraphService, NewAccount, ServiceError, TokenIssuer,
    };
    use crate::store::{ClaimConfigStore, GraphStore, IdentityStore, InMemoryIdentityStore};

    const SECRET: &str = "integration-secret";

    struct Harness {
        store: Arc<InMemoryIdentityStore>,
        accounts: AccountService,
        claims: ClaimConfigService,
        tokens: TokenIssuer,
        graph: GraphService,
    }

    fn setup() -> Harness {
        let store = Arc::new(InMemoryIdentityStore::new());
        let shared: Arc<dyn IdentityStore> = store.clone();
        let claims = ClaimConfigService::new(shared.clone());
        Harness {
            store,
            accounts: AccountService::new(shared.clone()),
            tokens: TokenIssuer::hs256(claims.clone(), SECRET),
            claims,
            graph: GraphService::new(shared),
        }
    }

    fn account(n: u32) -> NewAccount {
        NewAccount {
            username: format!("user{n}"),
            email: format!("user{n}@example.com"),
            phone: format!("+1555000{n}"),
            password: format!("password{n}"),
        }
    }

    fn raw_payload(token: &str) -> Value {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.required_spec_claims.clear();
        decode::<Value>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[tokio::test]
    async fn same_email_twice_conflicts_regardless_of_other_fields() {
        let h = setup();
        h.accounts.register(account(1)).await.unwrap();

        let mut again = account(2);
        again.email = "user1@example.com".into();
        let err = h.accounts.register(again).await.unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(h.accounts.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_phone_and_wrong_password_are_indistinguishable() {
        let h = setup();
        h.accounts.register(account(1)).await.unwrap();

        let wrong_phone = h
            .accounts
            .login("user1@example.com", "+15559999", "password1")
            .await
            .unwrap_err();
        let wrong_password = h
            .accounts
            .login("user1@example.com", "+15550001", "nope")
            .await
            .unwrap_err();

        assert_eq!(wrong_phone, wrong_password);
        assert_eq!(wrong_phone, ServiceError::Unauthorized(LOGIN_REJECTED.into()));
    }

    #[tokio::test]
    async fn assigning_twice_yields_one_binding() {
        let h = setup();
        let app = h.graph.create_application("crm").await.unwrap();
        let role = h.graph.create_role("admin").await.unwrap();

        let first = h.graph.assign_role(app.id, role.id).await.unwrap();
        let second = h.graph.assign_role(app.id, role.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.graph.app_roles(Some(app.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unassigning_a_missing_pair_reports_nothing_removed() {
        let h = setup();
        let app = h.graph.create_application("crm").await.unwrap();
        let role = h.graph.create_role("admin").await.unwrap();
        let user = h.accounts.register(account(1)).await.unwrap();

        assert!(!h.graph.unassign_role(app.id, role.id).await.unwrap());
        assert!(!h.graph.unassign_user(app.id, user.id).await.unwrap());

        h.graph.assign_user(app.id, user.id).await.unwrap();
        assert!(h.graph.unassign_user(app.id, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_an_application_leaves_no_orphans() {
        let h = setup();
        let app = h.graph.create_application("crm").await.unwrap();
        let other = h.graph.create_application("erp").await.unwrap();
        let role = h.graph.create_role("admin").await.unwrap();
        let user = h.accounts.register(account(1)).await.unwrap();

        h.graph.assign_role(app.id, role.id).await.unwrap();
        h.graph.assign_role(other.id, role.id).await.unwrap();
        h.graph.assign_user(app.id, user.id).await.unwrap();

        h.graph.delete_application(app.id).await.unwrap();

        let app_roles = h.store.app_role_views(None).await.unwrap();
        assert_eq!(app_roles.len(), 1);
        assert_eq!(app_roles[0].app_id, other.id);
        assert!(h.store.user_application_views(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_bindings() {
        let h = setup();
        let app = h.graph.create_application("crm").await.unwrap();
        let user = h.accounts.register(account(1)).await.unwrap();
        h.graph.assign_user(app.id, user.id).await.unwrap();

        h.accounts.delete(user.id).await.unwrap();

        assert!(h.graph.user_applications(Some(app.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_claims_follow_configuration() {
        let h = setup();
        let user = h.accounts.register(account(1)).await.unwrap();
        h.claims
            .update(&ClaimConfigPatch {
                include_user_id: Some(false),
                include_username: Some(true),
                include_email: Some(false),
                token_expiry: None,
            })
            .await
            .unwrap();

        let token = h.tokens.issue_for(&user).await.unwrap();
        let payload = raw_payload(&token);

        assert_eq!(payload["username"], "user1");
        assert!(payload.get("iat").is_some());
        assert!(payload.get("sub").is_none());
        assert!(payload.get("email").is_none());
        // The signer adds `exp`; nothing else may appear.
        let mut keys: Vec<_> = payload.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["exp", "iat", "username"]);
    }

    #[tokio::test]
    async fn access_resolution_keeps_application_order() {
        let h = setup();
        let user = h.accounts.register(account(1)).await.unwrap();
        let a = h.graph.create_application("zeta").await.unwrap();
        let b = h.graph.create_application("alpha").await.unwrap();
        let x = h.graph.create_role("x").await.unwrap();

        h.graph.assign_role(a.id, x.id).await.unwrap();
        h.graph.assign_user(a.id, user.id).await.unwrap();
        h.graph.assign_user(b.id, user.id).await.unwrap();

        let access = h.graph.access_for(user.id).await.unwrap();

        assert_eq!(access.user_id, user.id);
        assert_eq!(access.applications.len(), 2);
        assert_eq!(access.applications[0].id, a.id);
        assert_eq!(access.applications[0].roles.len(), 1);
        assert_eq!(access.applications[0].roles[0].id, x.id);
        assert_eq!(access.applications[1].id, b.id);
        assert!(access.applications[1].roles.is_empty());
    }

    #[tokio::test]
    async fn claim_configuration_is_created_once_with_defaults() {
        let h = setup();
        assert!(h.store.load_claim_config().await.unwrap().is_none());

        let first = h.claims.get().await.unwrap();
        assert_eq!(first, ClaimConfiguration::default());

        let second = h.claims.get().await.unwrap();
        assert_eq!(first, second);
        assert!(!h.store.create_claim_config(&first).await.unwrap());
    }

    #[tokio::test]
    async fn existing_row_wins_over_defaults() {
        let h = setup();
        let stored = ClaimConfiguration {
            include_email: false,
            token_expiry: "15m".into(),
            ..ClaimConfiguration::default()
        };
        assert!(h.store.create_claim_config(&stored).await.unwrap());

        assert_eq!(h.claims.get().await.unwrap(), stored);
        let patched = h
            .claims
            .update(&ClaimConfigPatch {
                include_user_id: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!patched.include_email);
        assert!(!patched.include_user_id);
        assert_eq!(patched.token_expiry, "15m");
    }
}
