//! Value objects: validated identity fields.
//!
//! Each type can only be constructed through `parse`, so holding one is proof
//! the boundary rules were checked. Rules mirror the request schemas clients
//! were built against (lengths in characters, not bytes).

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{DomainError, DomainResult};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,9}$")
        .expect("valid phone regex")
});

fn check_length(field: &str, value: &str, min: usize, max: usize) -> DomainResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(DomainError::validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

macro_rules! string_value_object {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $t(String);

        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_value_object!(
    /// 3–255 characters of ASCII letters, digits and underscore.
    Username
);
string_value_object!(
    /// Well-formed address, at most 255 characters.
    Email
);
string_value_object!(
    /// Loose international phone format, at most 20 characters.
    Phone
);
string_value_object!(
    /// Unique role name, 1–255 characters.
    RoleName
);
string_value_object!(
    /// Unique application name, 1–255 characters.
    AppName
);

impl Username {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("username", &raw, 3, 255)?;
        if !USERNAME_RE.is_match(&raw) {
            return Err(DomainError::validation(
                "username may only contain letters, digits and underscores",
            ));
        }
        Ok(Self(raw))
    }
}

impl Email {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("email", &raw, 1, 255)?;
        if !EMAIL_RE.is_match(&raw) {
            return Err(DomainError::validation("email must be a valid email address"));
        }
        Ok(Self(raw))
    }
}

impl Phone {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("phone", &raw, 1, 20)?;
        if !PHONE_RE.is_match(&raw) {
            return Err(DomainError::validation("phone must be a valid phone number"));
        }
        Ok(Self(raw))
    }
}

impl RoleName {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("roleName", &raw, 1, 255)?;
        Ok(Self(raw))
    }
}

impl AppName {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("appName", &raw, 1, 255)?;
        Ok(Self(raw))
    }
}

/// A plaintext password on its way to the hasher.
///
/// `Debug` is redacted and there is no `Serialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Password for a new or changed account: 6–255 characters.
    pub fn new_secret(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("password", &raw, 6, 255)?;
        Ok(Self(raw))
    }

    /// Password presented at login: 1–255 characters.
    pub fn presented(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        check_length("password", &raw, 1, 255)?;
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn username_rules() {
        assert!(Username::parse("alice_01").is_ok());
        assert!(Username::parse("al").is_err());
        assert!(Username::parse("alice smith").is_err());
        assert!(Username::parse("alice-smith").is_err());
        assert!(Username::parse("a".repeat(256)).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(Email::parse("alice@example.com").is_ok());
        assert!(Email::parse("alice@example").is_err());
        assert!(Email::parse("alice example.com").is_err());
        assert!(Email::parse("").is_err());
    }

    #[test]
    fn phone_rules() {
        for ok in ["+15550100", "(555) 123-4567", "555.123.4567", "+44 20 79460000"] {
            assert!(Phone::parse(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["phone", "12-34-56-78-90", "+1 (555) 123 4567 890 12"] {
            assert!(Phone::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::new_secret("hunter22").unwrap();
        assert_eq!(format!("{p:?}"), "Password(<redacted>)");
        assert!(Password::new_secret("short").is_err());
        assert!(Password::presented("x").is_ok());
        assert!(Password::presented("").is_err());
    }

    #[test]
    fn names_need_at_least_one_character() {
        assert!(RoleName::parse("").is_err());
        assert!(AppName::parse("").is_err());
        assert_eq!(RoleName::parse("admin").unwrap().as_str(), "admin");
    }

    proptest! {
        #[test]
        fn any_valid_charset_username_in_range_is_accepted(name in "[a-zA-Z0-9_]{3,64}") {
            prop_assert!(Username::parse(name).is_ok());
        }

        #[test]
        fn usernames_with_a_forbidden_char_are_rejected(
            prefix in "[a-z]{3,10}",
            bad in "[-!@# .]",
        ) {
            let candidate = format!("{prefix}{bad}");
            prop_assert!(Username::parse(candidate).is_err());
        }
    }
}
