use std::env;

use thiserror::Error;

const DEFAULT_DATABASE: &str = "GrocerySplit";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be a number between 0 and 65535, got {0:?}")]
    InvalidPort(String),
}

/// Start-up settings read from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Without a URI, members and expenses live in memory only.
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub bind_address: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            mongodb_uri: non_empty("MONGODB_URI"),
            database: non_empty("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.into()),
            bind_address: non_empty("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into()),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.mongodb_uri, None);
        assert_eq!(config.database, "GrocerySplit");
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn reads_every_setting() {
        let config = config(&[
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_DATABASE", "Flat42"),
            ("BIND_ADDRESS", "127.0.0.1"),
            ("PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.mongodb_uri.as_deref(), Some("mongodb://localhost:27017"));
        assert_eq!(config.database, "Flat42");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn blank_uri_means_in_memory() {
        assert_eq!(config(&[("MONGODB_URI", "  ")]).unwrap().mongodb_uri, None);
    }

    #[test]
    fn malformed_port_is_an_error() {
        assert_eq!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidPort("eighty".into()))
        );
    }
}
