use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Unset is fine for commands that never touch Postgres, such as `--dry-run` loads.
    pub database_url: Option<String>,
    pub store_timeout: Duration,
    pub max_connections: u32,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let timeout_secs = match lookup("PLACEMENT_STORE_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PLACEMENT_STORE_TIMEOUT_SECS is not a number: {raw}"))?,
            None => DEFAULT_STORE_TIMEOUT_SECS,
        };
        anyhow::ensure!(timeout_secs > 0, "PLACEMENT_STORE_TIMEOUT_SECS must be positive");

        let max_connections = match lookup("PLACEMENT_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("PLACEMENT_DB_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        anyhow::ensure!(max_connections > 0, "PLACEMENT_DB_MAX_CONNECTIONS must be positive");

        Ok(Self {
            database_url,
            store_timeout: Duration::from_secs(timeout_secs),
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/placements"),
            ("PLACEMENT_STORE_TIMEOUT_SECS", " 3 "),
            ("PLACEMENT_DB_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/placements"));
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config(&[("PLACEMENT_STORE_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("PLACEMENT_STORE_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("PLACEMENT_DB_MAX_CONNECTIONS", "-1")]).is_err());
    }

    #[test]
    fn blank_database_url_counts_as_unset() {
        assert_eq!(config(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }
}
