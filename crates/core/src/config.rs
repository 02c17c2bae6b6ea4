//! Configuration file
//!
//! Stored as TOML at `$OSC_CONFIG_DIR/config.toml`, falling back to
//! `<platform config dir>/osc/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "OSC_CONFIG_DIR";

/// Default number of concurrent part uploads
pub const DEFAULT_PARALLEL_UPLOADS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub aliases: Vec<Alias>,
}

/// Defaults applied when a command does not override them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Multipart part size in bytes; computed from the object size when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,

    /// Number of concurrent part uploads
    #[serde(default = "default_parallel_uploads")]
    pub parallel_uploads: usize,
}

fn default_output() -> String {
    "human".to_string()
}

fn default_color() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

fn default_parallel_uploads() -> usize {
    DEFAULT_PARALLEL_UPLOADS
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
            part_size: None,
            parallel_uploads: DEFAULT_PARALLEL_UPLOADS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            aliases: Vec::new(),
        }
    }
}

/// Loads and saves the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use `$OSC_CONFIG_DIR` or the platform config directory
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("osc"),
        };
        Ok(Self {
            config_path: dir.join("config.toml"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, or the default one if the file does not exist
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade osc.",
                config.schema_version, SCHEMA_VERSION
            )));
        }
        config.schema_version = SCHEMA_VERSION;

        if config.defaults.parallel_uploads == 0 {
            return Err(Error::Config(
                "defaults.parallel_uploads must be at least 1".into(),
            ));
        }

        tracing::debug!(path = %self.config_path.display(), aliases = config.aliases.len(), "loaded config");
        Ok(config)
    }

    /// Write the configuration, readable by the owner only
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::BucketLookup;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.output, "human");
        assert_eq!(config.defaults.color, "auto");
        assert_eq!(config.defaults.parallel_uploads, 3);
        assert_eq!(config.defaults.part_size, None);
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.defaults.part_size = Some(16 * 1024 * 1024);
        let mut alias = Alias::new("aws", "https://s3.amazonaws.com", "AKIA", "secret");
        alias.region = Some("eu-west-1".to_string());
        alias.bucket_lookup = BucketLookup::Dns;
        config.aliases.push(alias);

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.defaults.part_size, Some(16 * 1024 * 1024));
        assert_eq!(loaded.aliases.len(), 1);
        assert_eq!(loaded.aliases[0].region.as_deref(), Some("eu-west-1"));
        assert_eq!(loaded.aliases[0].bucket_lookup, BucketLookup::Dns);
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            r#"
            schema_version = 1

            [[aliases]]
            name = "local"
            endpoint = "http://localhost:9000"
            "#,
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.defaults.parallel_uploads, 3);
        assert!(config.aliases[0].is_anonymous());
    }

    #[test]
    fn test_zero_parallel_uploads_rejected() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[defaults]\nparallel_uploads = 0\n",
        )
        .unwrap();

        assert!(matches!(manager.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            format!("schema_version = {}\n", SCHEMA_VERSION + 1),
        )
        .unwrap();

        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
