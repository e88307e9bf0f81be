use iacp_auth::TokenClaims;

/// Authenticated caller of a protected route.
///
/// Inserted by the auth middleware. Immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    claims: TokenClaims,
}

impl CallerContext {
    pub fn new(claims: TokenClaims) -> Self {
        Self { claims }
    }

    /// Best available label for logs: id, else username, else email.
    pub fn label(&self) -> String {
        match (&self.claims.sub, &self.claims.username, &self.claims.email) {
            (Some(id), _, _) => format!("user:{id}"),
            (None, Some(username), _) => username.clone(),
            (None, None, Some(email)) => email.clone(),
            (None, None, None) => "anonymous-token".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacp_core::UserId;

    fn claims(sub: Option<i32>, username: Option<&str>, email: Option<&str>) -> TokenClaims {
        TokenClaims {
            sub: sub.map(UserId::new),
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            iat: 0,
            exp: None,
        }
    }

    #[test]
    fn label_prefers_id_then_username_then_email() {
        let label = |c| CallerContext::new(c).label();
        assert_eq!(label(claims(Some(7), Some("alice"), None)), "user:7");
        assert_eq!(label(claims(None, Some("alice"), Some("a@example.com"))), "alice");
        assert_eq!(label(claims(None, None, Some("a@example.com"))), "a@example.com");
        assert_eq!(label(claims(None, None, None)), "anonymous-token");
    }
}
