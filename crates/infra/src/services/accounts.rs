//! User accounts: registration, login, and admin maintenance.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use iacp_auth::{TokenClaims, hash_password, verify_against_dummy, verify_password};
use iacp_core::{Email, Password, Phone, User, UserId, Username};

use super::{ServiceError, ServiceResult, blocking};
use crate::store::{IdentityStore, NewUser, StoreError, UserChanges, constraints};

/// Every login failure carries this exact message.
pub const LOGIN_REJECTED: &str = "Invalid email, phone, or password";

const IDENTITY_TAKEN: &str = "User with this email, username, or phone number already exists";

/// Raw registration input; validated by [`AccountService::register`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Partial profile change; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Create an account. Fails with a conflict if the username, email or
    /// phone is already registered.
    #[instrument(skip_all, fields(username = %account.username))]
    pub async fn register(&self, account: NewAccount) -> ServiceResult<User> {
        let username = Username::parse(account.username)?;
        let email = Email::parse(account.email)?;
        let phone = Phone::parse(account.phone)?;
        let password = Password::new_secret(account.password)?;

        let taken = self.store.user_by_email(email.as_str()).await?.is_some()
            || self.store.user_by_username(username.as_str()).await?.is_some()
            || self.store.user_by_phone(phone.as_str()).await?.is_some();
        if taken {
            return Err(ServiceError::Conflict(IDENTITY_TAKEN.into()));
        }

        let password_hash = blocking(move || hash_password(&password)).await??;
        let user = self
            .store
            .insert_user(NewUser {
                username: username.into_inner(),
                email: email.into_inner(),
                phone: phone.into_inner(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => ServiceError::Conflict(IDENTITY_TAKEN.into()),
                other => other.into(),
            })?;

        info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    /// Authenticate by email, phone and password.
    ///
    /// Unknown email, phone mismatch and wrong password are indistinguishable
    /// to the caller, and each costs one password verification.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, phone: &str, password: &str) -> ServiceResult<User> {
        let email = Email::parse(email)?;
        let phone = Phone::parse(phone)?;
        let password = Password::presented(password)?;

        let Some(user) = self.store.user_by_email(email.as_str()).await? else {
            blocking(move || verify_against_dummy(password.expose())).await?;
            debug!("login rejected: unknown email");
            return Err(ServiceError::Unauthorized(LOGIN_REJECTED.into()));
        };

        let hash = user.password_hash.clone();
        let password_ok = blocking(move || verify_password(password.expose(), &hash)).await?;
        let phone_ok = user.phone == phone.as_str();
        if !(password_ok && phone_ok) {
            debug!(user_id = %user.id, "login rejected: credential mismatch");
            return Err(ServiceError::Unauthorized(LOGIN_REJECTED.into()));
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    /// Locate the user a token was issued to: by `sub`, else `email`, else
    /// `username`, depending on which claims the token carries.
    pub async fn resolve_claims(&self, claims: &TokenClaims) -> ServiceResult<User> {
        let user = if let Some(id) = claims.sub {
            self.store.user_by_id(id).await?
        } else if let Some(email) = &claims.email {
            self.store.user_by_email(email).await?
        } else if let Some(username) = &claims.username {
            self.store.user_by_username(username).await?
        } else {
            None
        };
        user.ok_or_else(|| ServiceError::not_found("User"))
    }

    /// Apply a partial profile change. Each supplied identity field must not
    /// belong to another user.
    #[instrument(skip(self, update), fields(user_id = %id))]
    pub async fn update(&self, id: UserId, update: ProfileUpdate) -> ServiceResult<User> {
        let username = update.username.map(Username::parse).transpose()?;
        let email = update.email.map(Email::parse).transpose()?;
        let phone = update.phone.map(Phone::parse).transpose()?;
        let password = update.password.map(Password::new_secret).transpose()?;

        let existing = self.get(id).await?;

        if let Some(email) = &email {
            if email.as_str() != existing.email
                && self.store.user_by_email(email.as_str()).await?.is_some()
            {
                return Err(field_taken("email"));
            }
        }
        if let Some(username) = &username {
            if username.as_str() != existing.username
                && self.store.user_by_username(username.as_str()).await?.is_some()
            {
                return Err(field_taken("username"));
            }
        }
        if let Some(phone) = &phone {
            if phone.as_str() != existing.phone
                && self.store.user_by_phone(phone.as_str()).await?.is_some()
            {
                return Err(field_taken("phone number"));
            }
        }

        let password_hash = match password {
            Some(password) => Some(blocking(move || hash_password(&password)).await??),
            None => None,
        };

        let changes = UserChanges {
            username: username.map(Username::into_inner),
            email: email.map(Email::into_inner),
            phone: phone.map(Phone::into_inner),
            password_hash,
        };

        match self.store.update_user(id, changes).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::not_found("User")),
            Err(StoreError::UniqueViolation { constraint }) => {
                warn!(%constraint, "profile update lost a uniqueness race");
                Err(match constraint.as_str() {
                    constraints::USERS_USERNAME => field_taken("username"),
                    constraints::USERS_PHONE => field_taken("phone number"),
                    _ => field_taken("email"),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a user; their application bindings go with them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> ServiceResult<()> {
        if self.store.delete_user(id).await? {
            info!(user_id = %id, "deleted user");
            Ok(())
        } else {
            Err(ServiceError::not_found("User"))
        }
    }
}

fn field_taken(field: &str) -> ServiceError {
    ServiceError::Conflict(format!("User with this {field} already exists"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryIdentityStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryIdentityStore::new()))
    }

    fn alice() -> NewAccount {
        NewAccount {
            username: "alice".into(),
            email: "alice@example.com".into(),
            phone: "+15550100".into(),
            password: "secret1".into(),
        }
    }

    #[tokio::test]
    async fn register_hashes_the_password() {
        let svc = service();
        let user = svc.register(alice()).await.unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(verify_password("secret1", &user.password_hash));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let svc = service();
        let mut bad = alice();
        bad.username = "no spaces allowed".into();
        assert!(matches!(svc.register(bad).await, Err(ServiceError::Validation(_))));

        let mut short = alice();
        short.password = "12345".into();
        assert!(matches!(svc.register(short).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn login_succeeds_with_matching_credentials() {
        let svc = service();
        let registered = svc.register(alice()).await.unwrap();
        let user = svc
            .login("alice@example.com", "+15550100", "secret1")
            .await
            .unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn unknown_email_gets_the_generic_message() {
        let svc = service();
        let err = svc
            .login("nobody@example.com", "+15550100", "secret1")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Unauthorized(LOGIN_REJECTED.into()));
    }

    #[tokio::test]
    async fn update_rejects_identity_of_another_user() {
        let svc = service();
        let a = svc.register(alice()).await.unwrap();
        svc.register(NewAccount {
            username: "bob".into(),
            email: "bob@example.com".into(),
            phone: "+15550200".into(),
            password: "secret2".into(),
        })
        .await
        .unwrap();

        let err = svc
            .update(
                a.id,
                ProfileUpdate {
                    phone: Some("+15550200".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Conflict("User with this phone number already exists".into())
        );
    }

    #[tokio::test]
    async fn update_keeps_untouched_fields_and_rehashes_password() {
        let svc = service();
        let a = svc.register(alice()).await.unwrap();

        let updated = svc
            .update(
                a.id,
                ProfileUpdate {
                    email: Some("alice@example.com".into()),
                    password: Some("fresh-secret".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "alice");
        assert_eq!(updated.phone, "+15550100");
        assert!(verify_password("fresh-secret", &updated.password_hash));
        assert!(!verify_password("secret1", &updated.password_hash));
    }

    #[tokio::test]
    async fn resolve_claims_falls_back_to_email_then_username() {
        let svc = service();
        let a = svc.register(alice()).await.unwrap();

        let by_username = TokenClaims {
            sub: None,
            username: Some("alice".into()),
            email: None,
            iat: 0,
            exp: None,
        };
        assert_eq!(svc.resolve_claims(&by_username).await.unwrap().id, a.id);

        let by_email = TokenClaims {
            username: None,
            email: Some("alice@example.com".into()),
            ..by_username.clone()
        };
        assert_eq!(svc.resolve_claims(&by_email).await.unwrap().id, a.id);

        let empty = TokenClaims {
            username: None,
            ..by_username
        };
        assert_eq!(
            svc.resolve_claims(&empty).await,
            Err(ServiceError::NotFound("User not found".into()))
        );
    }

    #[tokio::test]
    async fn delete_unknown_user_is_not_found() {
        let svc = service();
        assert_eq!(
            svc.delete(UserId::new(99)).await,
            Err(ServiceError::NotFound("User not found".into()))
        );
    }
}
