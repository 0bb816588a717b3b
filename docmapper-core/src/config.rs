//! Repository configuration.
//!
//! A repository is addressed by a short `host[:port]/database` URI, optionally prefixed
//! with `mongodb://`. [`RepositoryConfig`] pairs that address with the strictness flag
//! applied to every dataset the repository hands out, and can be loaded from JSON:
//!
//! ```ignore
//! use docmapper::config::RepositoryConfig;
//!
//! let config = RepositoryConfig::from_json_str(r#"{ "uri": "localhost:27017/app", "strict": true }"#)?;
//! assert_eq!(config.uri.database, "app");
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};

const SCHEME: &str = "mongodb://";

/// The address of a database: a host (with optional port) and a database name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionUri {
    pub host: String,
    pub database: String,
}

impl ConnectionUri {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        ConnectionUri {
            host: host.into(),
            database: database.into(),
        }
    }

    /// Returns a driver connection string for the host, without the database.
    pub fn dsn(&self) -> String {
        format!("{}{}", SCHEME, self.host)
    }
}

impl FromStr for ConnectionUri {
    type Err = DatasetError;

    fn from_str(uri: &str) -> DatasetResult<Self> {
        let trimmed = uri.trim();
        let address = trimmed.strip_prefix(SCHEME).unwrap_or(trimmed);

        let (host, database) = address
            .split_once('/')
            .ok_or_else(|| DatasetError::Configuration(format!("missing database in uri {:?}", uri)))?;
        // Driver options after `?` are not part of the database name.
        let database = database
            .split('?')
            .next()
            .unwrap_or_default();

        if host.is_empty() {
            return Err(DatasetError::Configuration(format!("missing host in uri {:?}", uri)));
        }
        if database.is_empty() {
            return Err(DatasetError::Configuration(format!("missing database in uri {:?}", uri)));
        }

        Ok(ConnectionUri::new(host, database))
    }
}

impl TryFrom<String> for ConnectionUri {
    type Error = DatasetError;

    fn try_from(uri: String) -> DatasetResult<Self> {
        uri.parse()
    }
}

impl From<ConnectionUri> for String {
    fn from(uri: ConnectionUri) -> Self {
        uri.to_string()
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.database)
    }
}

/// Settings shared by the datasets of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Where the database lives.
    pub uri: ConnectionUri,
    /// Reject unsupported view options instead of skipping them.
    #[serde(default)]
    pub strict: bool,
}

impl RepositoryConfig {
    pub fn new(uri: ConnectionUri) -> Self {
        RepositoryConfig { uri, strict: false }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parses a configuration from a JSON object.
    pub fn from_json_str(json: &str) -> DatasetResult<Self> {
        serde_json::from_str(json).map_err(|e| DatasetError::Configuration(e.to_string()))
    }
}

impl FromStr for RepositoryConfig {
    type Err = DatasetError;

    /// Parses a bare URI into a non-strict configuration.
    fn from_str(uri: &str) -> DatasetResult<Self> {
        Ok(RepositoryConfig::new(uri.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uris_split_host_and_database() {
        let uri: ConnectionUri = "localhost:27017/rom".parse().unwrap();

        assert_eq!(uri, ConnectionUri::new("localhost:27017", "rom"));
        assert_eq!(uri.dsn(), "mongodb://localhost:27017");
        assert_eq!(uri.to_string(), "localhost:27017/rom");
    }

    #[test]
    fn scheme_and_options_are_stripped() {
        let uri: ConnectionUri = "mongodb://db.internal/app?retryWrites=true".parse().unwrap();
        assert_eq!(uri, ConnectionUri::new("db.internal", "app"));
    }

    #[test]
    fn incomplete_uris_are_rejected() {
        for uri in ["localhost:27017", "/app", "localhost/", ""] {
            assert!(
                matches!(uri.parse::<ConnectionUri>(), Err(DatasetError::Configuration(_))),
                "{:?} should not parse",
                uri
            );
        }
    }

    #[test]
    fn config_loads_from_json() {
        let config = RepositoryConfig::from_json_str(r#"{ "uri": "localhost/app", "strict": true }"#).unwrap();
        assert_eq!(config.uri.database, "app");
        assert!(config.strict);

        let config = RepositoryConfig::from_json_str(r#"{ "uri": "localhost/app" }"#).unwrap();
        assert!(!config.strict);

        assert!(matches!(
            RepositoryConfig::from_json_str(r#"{ "uri": "localhost" }"#),
            Err(DatasetError::Configuration(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config: RepositoryConfig = "localhost:27017/app".parse().unwrap();
        let json = serde_json::to_string(&config.clone().with_strict(true)).unwrap();

        assert_eq!(json, r#"{"uri":"localhost:27017/app","strict":true}"#);
    }
}
