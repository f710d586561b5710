use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Snapshot file; the store is memory-only when unset.
    pub data_file: Option<PathBuf>,
    pub bcrypt_cost: u32,
    pub cors_permissive: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_file: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_permissive: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("APP_HOST").unwrap_or(defaults.host);

        let port = match lookup("APP_PORT") {
            Some(raw) => raw.parse::<u16>().context("APP_PORT must be a valid u16")?,
            None => defaults.port,
        };

        let data_file = lookup("DATA_FILE")
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => {
                let cost = raw.parse::<u32>().context("BCRYPT_COST must be a valid u32")?;
                anyhow::ensure!(
                    (4..=31).contains(&cost),
                    "BCRYPT_COST must be between 4 and 31, got {cost}"
                );
                cost
            }
            None => defaults.bcrypt_cost,
        };

        let cors_permissive = match lookup("CORS_PERMISSIVE") {
            Some(raw) => parse_flag(&raw).context("CORS_PERMISSIVE must be true or false")?,
            None => defaults.cors_permissive,
        };

        Ok(Self {
            host,
            port,
            data_file,
            bcrypt_cost,
            cors_permissive,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("unrecognised flag value '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.address(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "3000"),
            ("DATA_FILE", "/tmp/store.snapshot"),
            ("BCRYPT_COST", "6"),
            ("CORS_PERMISSIVE", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.address(), "127.0.0.1:3000");
        assert_eq!(cfg.data_file, Some(PathBuf::from("/tmp/store.snapshot")));
        assert_eq!(cfg.bcrypt_cost, 6);
        assert!(cfg.cors_permissive);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config(&[("APP_PORT", "http")]).is_err());
        assert!(config(&[("BCRYPT_COST", "2")]).is_err());
        assert!(config(&[("CORS_PERMISSIVE", "maybe")]).is_err());
    }
}
