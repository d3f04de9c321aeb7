use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets shipped in sample .env files.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Seconds between edge reconciliation passes; 0 disables them
    pub reconcile_secs: u64,
    /// Empty means any origin
    pub client_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("PORCH_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PORCH_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("PORCH_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORCH_PORT is not a port: {}", raw))?,
            None => 5000,
        };
        let reconcile_secs = match var("PORCH_RECONCILE_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORCH_RECONCILE_SECS is not a number: {}", raw))?,
            None => 600,
        };

        Ok(Self {
            host: var("PORCH_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("PORCH_DB_PATH").unwrap_or_else(|| "porch.db".into()).into(),
            jwt_secret,
            reconcile_secs,
            client_origins: var("PORCH_CLIENT_ORIGIN")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("PORCH_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.db_path, PathBuf::from("porch.db"));
        assert_eq!(config.reconcile_secs, 600);
        assert!(config.client_origins.is_empty());
    }

    #[test]
    fn placeholder_or_missing_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("PORCH_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = config(&[
            ("PORCH_JWT_SECRET", "a-real-secret"),
            ("PORCH_CLIENT_ORIGIN", "https://porch.example, http://localhost:5173,"),
            ("PORCH_RECONCILE_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(
            config.client_origins,
            vec!["https://porch.example", "http://localhost:5173"]
        );
        assert_eq!(config.reconcile_secs, 0);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("PORCH_JWT_SECRET", "x"), ("PORCH_PORT", "http")]).is_err());
    }
}
