//! Alias management
//!
//! An alias names an S3-compatible endpoint together with the credentials
//! and addressing options used to reach it.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Transport-level retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry, doubled on each further attempt
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryConfig {
    /// Backoff to wait after the given (zero-based) failed attempt
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    300_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// How bucket names are placed in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketLookup {
    /// Decide from the endpoint host (virtual style for AWS and Aliyun)
    #[default]
    Auto,
    /// Bucket as the first path segment
    Path,
    /// Bucket as a host prefix
    Dns,
}

impl std::str::FromStr for BucketLookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "path" => Ok(Self::Path),
            "dns" | "virtual" => Ok(Self::Dns),
            other => Err(Error::Config(format!(
                "bucket lookup must be one of auto, path, dns; got '{other}'"
            ))),
        }
    }
}

/// A named S3-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Unique name for this alias
    pub name: String,

    /// Endpoint URL, e.g. `https://play.min.io`
    pub endpoint: String,

    /// Access key ID; empty for anonymous access
    #[serde(default)]
    pub access_key: String,

    /// Secret access key
    #[serde(default)]
    pub secret_key: String,

    /// Temporary session token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Fixed region. When unset, the region of each bucket is looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Bucket addressing style
    #[serde(default)]
    pub bucket_lookup: BucketLookup,

    /// Use the transfer-acceleration endpoint (AWS only)
    #[serde(default)]
    pub accelerate: bool,

    /// Use the dual-stack endpoint (AWS only)
    #[serde(default)]
    pub dualstack: bool,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Path to a PEM CA bundle used instead of the system roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl Alias {
    /// Create a new alias with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
            region: None,
            bucket_lookup: BucketLookup::Auto,
            accelerate: false,
            dualstack: false,
            insecure: false,
            ca_bundle: None,
            retry: None,
            timeout: None,
        }
    }

    /// Whether requests through this alias are signed
    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty()
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(Error::Config(format!(
                "alias name '{}' may only contain letters, digits, '-' and '_'",
                self.name
            )));
        }
        let url = url::Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "endpoint scheme must be http or https: {}",
                self.endpoint
            )));
        }
        if self.access_key.is_empty() != self.secret_key.is_empty() {
            return Err(Error::Config(
                "access key and secret key must be given together".into(),
            ));
        }
        Ok(())
    }
}

/// Stores aliases in the configuration file
pub struct AliasManager {
    config_manager: ConfigManager,
}

impl AliasManager {
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Use the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn list(&self) -> Result<Vec<Alias>> {
        Ok(self.config_manager.load()?.aliases)
    }

    pub fn get(&self, name: &str) -> Result<Alias> {
        self.config_manager
            .load()?
            .aliases
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))
    }

    /// Add an alias, replacing any alias with the same name.
    ///
    /// Returns true if an existing alias was replaced.
    pub fn set(&self, alias: Alias) -> Result<bool> {
        alias.validate()?;
        let mut config = self.config_manager.load()?;
        let before = config.aliases.len();
        config.aliases.retain(|a| a.name != alias.name);
        let replaced = config.aliases.len() != before;
        config.aliases.push(alias);
        self.config_manager.save(&config)?;
        Ok(replaced)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let before = config.aliases.len();
        config.aliases.retain(|a| a.name != name);
        if config.aliases.len() == before {
            return Err(Error::AliasNotFound(name.to_string()));
        }
        self.config_manager.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_alias_manager() -> (AliasManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        (AliasManager::with_config_manager(config_manager), temp_dir)
    }

    #[test]
    fn test_alias_defaults() {
        let alias = Alias::new("play", "https://play.min.io", "access", "secret");
        assert_eq!(alias.region, None);
        assert_eq!(alias.bucket_lookup, BucketLookup::Auto);
        assert!(!alias.accelerate);
        assert!(!alias.is_anonymous());
        assert_eq!(alias.retry_config().max_attempts, 5);
    }

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_ms(0), 200);
        assert_eq!(retry.backoff_ms(1), 400);
        assert_eq!(retry.backoff_ms(2), 800);
        assert_eq!(retry.backoff_ms(20), 10_000);
        assert_eq!(retry.backoff_ms(80), 10_000);
    }

    #[test]
    fn test_bucket_lookup_parse() {
        assert_eq!("path".parse::<BucketLookup>().unwrap(), BucketLookup::Path);
        assert_eq!("virtual".parse::<BucketLookup>().unwrap(), BucketLookup::Dns);
        assert!("sideways".parse::<BucketLookup>().is_err());
    }

    #[test]
    fn test_set_get_and_replace() {
        let (manager, _temp_dir) = temp_alias_manager();

        let replaced = manager
            .set(Alias::new("local", "http://localhost:9000", "a", "b"))
            .unwrap();
        assert!(!replaced);

        let replaced = manager
            .set(Alias::new("local", "http://127.0.0.1:9000", "c", "d"))
            .unwrap();
        assert!(replaced);

        let aliases = manager.list().unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(manager.get("local").unwrap().endpoint, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_set_rejects_invalid_alias() {
        let (manager, _temp_dir) = temp_alias_manager();

        let bad_scheme = Alias::new("x", "ftp://localhost", "a", "b");
        assert!(matches!(manager.set(bad_scheme), Err(Error::Config(_))));

        let bad_name = Alias::new("has space", "http://localhost:9000", "a", "b");
        assert!(matches!(manager.set(bad_name), Err(Error::Config(_))));

        let half_credentials = Alias::new("half", "http://localhost:9000", "a", "");
        assert!(matches!(manager.set(half_credentials), Err(Error::Config(_))));
    }

    #[test]
    fn test_remove_and_not_found() {
        let (manager, _temp_dir) = temp_alias_manager();

        manager
            .set(Alias::new("gone", "http://localhost:9000", "", ""))
            .unwrap();
        manager.remove("gone").unwrap();

        assert!(matches!(manager.get("gone"), Err(Error::AliasNotFound(_))));
        assert!(matches!(manager.remove("gone"), Err(Error::AliasNotFound(_))));
    }
}
