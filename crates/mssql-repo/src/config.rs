//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// Connection and migration settings, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Directory migration scripts are written to and applied from
    /// (default: "migrations").
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

fn default_port() -> u16 {
    1433
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_migrations_dir() -> String {
    "migrations".to_string()
}

impl RepoConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RepoConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RepoError::Config("host is required".into()));
        }
        if self.database.is_empty() {
            return Err(RepoError::Config("database is required".into()));
        }
        if self.user.is_empty() {
            return Err(RepoError::Config("user is required".into()));
        }
        if self.migrations_dir.is_empty() {
            return Err(RepoError::Config("migrations_dir is required".into()));
        }
        Ok(())
    }

    /// Build a connection string for tiberius.
    pub fn connection_string(&self) -> String {
        self.connection_string_for(&self.database)
    }

    /// Server-level connection string (master database), used before the
    /// target database exists.
    pub fn server_connection_string(&self) -> String {
        self.connection_string_for("master")
    }

    fn connection_string_for(&self, database: &str) -> String {
        let encrypt = match self.encrypt.to_lowercase().as_str() {
            "true" | "yes" | "1" => "true",
            "false" | "no" | "0" | "disable" => "false",
            _ => "true",
        };

        format!(
            "Server=tcp:{},{};Database={};User Id={};Password={};Encrypt={};TrustServerCertificate={}",
            self.host,
            self.port,
            database,
            self.user,
            self.password,
            encrypt,
            self.trust_server_cert
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
host: db.example.com
database: AppDb
user: app
password: secret
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = RepoConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.port, 1433);
        assert_eq!(config.encrypt, "true");
        assert!(!config.trust_server_cert);
        assert_eq!(config.migrations_dir, "migrations");
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let err = RepoConfig::from_yaml("host: ''\ndatabase: d\nuser: u\npassword: p\n")
            .unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_connection_string_shape() {
        let config = RepoConfig::from_yaml(YAML).unwrap();
        assert_eq!(
            config.connection_string(),
            "Server=tcp:db.example.com,1433;Database=AppDb;User Id=app;Password=secret;\
             Encrypt=true;TrustServerCertificate=false"
        );
        assert!(config
            .server_connection_string()
            .contains("Database=master"));
    }
}
