//! Process configuration from environment variables.

use anyhow::Context;

use iacp_observability::LogFormat;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4501;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub log_format: LogFormat,
}

impl ApiConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT must be a port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => LogFormat::default(),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            jwt_secret,
            database_url: database_url(&get),
            max_connections,
            log_format,
        })
    }

    /// Configuration for tests and local runs: in-memory store, random port.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: jwt_secret.into(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_format: LogFormat::default(),
        }
    }

    /// True when `JWT_SECRET` was not supplied.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `POSTGRES_*` parts win over `DATABASE_URL` when user, password and
/// database are all present.
fn database_url(get: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if let (Some(user), Some(password), Some(db)) =
        (get("POSTGRES_USER"), get("POSTGRES_PASSWORD"), get("POSTGRES_DB"))
    {
        let host = get("POSTGRES_HOST").unwrap_or_else(|| "localhost".into());
        let port = get("POSTGRES_PORT").unwrap_or_else(|| "5432".into());
        return Some(format!("postgres://{user}:{password}@{host}:{port}/{db}"));
    }
    get("DATABASE_URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ApiConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr(), "0.0.0.0:4501");
        assert!(c.uses_dev_secret());
        assert_eq!(c.database_url, None);
        assert_eq!(c.max_connections, 5);
        assert_eq!(c.log_format, LogFormat::Json);
    }

    #[test]
    fn postgres_parts_take_precedence() {
        let c = config(&[
            ("DATABASE_URL", "postgres://ignored/db"),
            ("POSTGRES_USER", "iacp"),
            ("POSTGRES_PASSWORD", "pw"),
            ("POSTGRES_DB", "identity"),
            ("POSTGRES_PORT", "6543"),
        ])
        .unwrap();
        assert_eq!(
            c.database_url.as_deref(),
            Some("postgres://iacp:pw@localhost:6543/identity")
        );
    }

    #[test]
    fn partial_postgres_parts_fall_back_to_database_url() {
        let c = config(&[
            ("DATABASE_URL", "postgres://app@db/identity"),
            ("POSTGRES_USER", "iacp"),
        ])
        .unwrap();
        assert_eq!(c.database_url.as_deref(), Some("postgres://app@db/identity"));
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(config(&[("PORT", "http")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
