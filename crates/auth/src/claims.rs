use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iacp_core::{DomainError, User, UserId};

use crate::expiry::TokenExpiry;

pub const DEFAULT_TOKEN_EXPIRY: &str = "24h";

/// Which claims issued tokens carry, and for how long they stay valid.
///
/// There is exactly one of these per deployment. Wire names follow the
/// backend contract (`Username`, `Email`, `UserId`, `tokenExpiry`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimConfiguration {
    #[serde(rename = "Username")]
    pub include_username: bool,

    #[serde(rename = "Email")]
    pub include_email: bool,

    #[serde(rename = "UserId")]
    pub include_user_id: bool,

    /// Relative lifetime such as `24h`; parsed by the signer.
    #[serde(rename = "tokenExpiry")]
    pub token_expiry: String,
}

impl Default for ClaimConfiguration {
    fn default() -> Self {
        Self {
            include_username: true,
            include_email: true,
            include_user_id: true,
            token_expiry: DEFAULT_TOKEN_EXPIRY.to_string(),
        }
    }
}

/// Partial update of the claim configuration: `None` leaves a field untouched.
///
/// The admin UI's `include*` names are accepted as aliases. A phone-number
/// flag is deliberately not modelled; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimConfigPatch {
    #[serde(default, rename = "Username", alias = "includeUsername", skip_serializing_if = "Option::is_none")]
    pub include_username: Option<bool>,

    #[serde(default, rename = "Email", alias = "includeEmail", skip_serializing_if = "Option::is_none")]
    pub include_email: Option<bool>,

    #[serde(default, rename = "UserId", alias = "includeUserId", skip_serializing_if = "Option::is_none")]
    pub include_user_id: Option<bool>,

    #[serde(default, rename = "tokenExpiry", skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<String>,
}

impl ClaimConfigPatch {
    /// Reject a `tokenExpiry` that the signer could not turn into a lifetime.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(raw) = &self.token_expiry {
            TokenExpiry::parse(raw)
                .and_then(|expiry| expiry.to_duration())
                .map_err(|e| DomainError::validation(e.to_string()))?;
        }
        Ok(())
    }

    /// Overwrite only the supplied fields.
    pub fn apply_to(&self, config: &mut ClaimConfiguration) {
        if let Some(v) = self.include_username {
            config.include_username = v;
        }
        if let Some(v) = self.include_email {
            config.include_email = v;
        }
        if let Some(v) = self.include_user_id {
            config.include_user_id = v;
        }
        if let Some(v) = &self.token_expiry {
            config.token_expiry = v.clone();
        }
    }

    /// Supplied fields layered over the defaults.
    pub fn over_defaults(&self) -> ClaimConfiguration {
        let mut config = ClaimConfiguration::default();
        self.apply_to(&mut config);
        config
    }
}

/// Payload of an issued token.
///
/// `iat` is always present. `sub`, `username` and `email` appear only when the
/// claim configuration enabled them at issuance. `exp` is stamped by the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Build the claim set for `user` under `config`.
///
/// A claim whose flag is off is never included.
pub fn build_payload(user: &User, config: &ClaimConfiguration, issued_at: DateTime<Utc>) -> TokenClaims {
    TokenClaims {
        sub: config.include_user_id.then_some(user.id),
        username: config.include_username.then(|| user.username.clone()),
        email: config.include_email.then(|| user.email.clone()),
        iat: issued_at.timestamp(),
        exp: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            username: "alice".into(),
            email: "alice@example.com".into(),
            phone: "+15550100".into(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_configuration_includes_everything_for_a_day() {
        let c = ClaimConfiguration::default();
        assert!(c.include_username && c.include_email && c.include_user_id);
        assert_eq!(c.token_expiry, "24h");
    }

    #[test]
    fn payload_follows_flags() {
        let config = ClaimConfiguration {
            include_username: true,
            include_email: false,
            include_user_id: false,
            token_expiry: "1h".into(),
        };
        let issued_at = Utc::now();
        let claims = build_payload(&user(), &config, issued_at);

        let json = serde_json::to_value(&claims).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(json["username"], "alice");
        assert_eq!(json["iat"], issued_at.timestamp());
        assert!(json.get("sub").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn full_payload_has_numeric_sub() {
        let claims = build_payload(&user(), &ClaimConfiguration::default(), Utc::now());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], 7);
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn patch_touches_only_supplied_fields() {
        let mut config = ClaimConfiguration::default();
        let patch = ClaimConfigPatch {
            include_email: Some(false),
            ..Default::default()
        };
        patch.apply_to(&mut config);

        assert!(!config.include_email);
        assert!(config.include_username);
        assert!(config.include_user_id);
        assert_eq!(config.token_expiry, "24h");
    }

    #[test]
    fn patch_accepts_backend_and_frontend_names() {
        let backend: ClaimConfigPatch =
            serde_json::from_value(serde_json::json!({ "Username": false, "tokenExpiry": "30m" })).unwrap();
        assert_eq!(backend.include_username, Some(false));
        assert_eq!(backend.token_expiry.as_deref(), Some("30m"));

        let frontend: ClaimConfigPatch = serde_json::from_value(serde_json::json!({
            "includeEmail": false,
            "includeUserId": true,
            "includePhoneNumber": true,
        }))
        .unwrap();
        assert_eq!(frontend.include_email, Some(false));
        assert_eq!(frontend.include_user_id, Some(true));
        assert!(frontend.include_username.is_none());
    }

    #[test]
    fn patch_validation_checks_expiry_format() {
        let bad = ClaimConfigPatch {
            token_expiry: Some("forever".into()),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(DomainError::Validation(_))));
        assert!(ClaimConfigPatch::default().validate().is_ok());
    }

    #[test]
    fn patch_validation_rejects_lifetimes_too_large_to_sign() {
        let huge = ClaimConfigPatch {
            token_expiry: Some("200000000000d".into()),
            ..Default::default()
        };
        assert!(matches!(huge.validate(), Err(DomainError::Validation(_))));

        let week = ClaimConfigPatch {
            token_expiry: Some("7d".into()),
            ..Default::default()
        };
        assert!(week.validate().is_ok());
    }

    #[test]
    fn over_defaults_fills_missing_fields() {
        let patch = ClaimConfigPatch {
            include_user_id: Some(false),
            ..Default::default()
        };
        let config = patch.over_defaults();
        assert!(!config.include_user_id);
        assert!(config.include_email);
        assert_eq!(config.token_expiry, DEFAULT_TOKEN_EXPIRY);
    }
}
