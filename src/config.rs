//! Layered configuration loading using figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`JOURNAL_BRIDGE_*`, `__` separates sections)
//! 2. `./journal-bridge.toml`
//! 3. `<config dir>/journal-bridge/config.toml`
//! 4. Built-in defaults
//!
//! `JOURNAL_BRIDGE_IMPORTER__BINARY=/opt/bin/dayone2` maps to `importer.binary`.

use crate::validate::DEFAULT_TIMESTAMP_FORMAT;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "JOURNAL_BRIDGE_";
pub const LOCAL_CONFIG_FILE: &str = "journal-bridge.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

// ============================================================================
// SECTIONS
// ============================================================================

fn default_binary() -> String {
    "dayone2".to_string()
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImporterConfig {
    /// Importer executable, looked up on PATH
    #[serde(default = "default_binary")]
    pub binary: String,

    /// strftime format for the importer's date flag
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarkupConfig {
    /// JSON file of rewrite rules and name fixes
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    /// Rewrite `<a href>` into Markdown links
    #[serde(default)]
    pub convert_links: bool,
}

fn default_ledger_file() -> String {
    "import-ledger.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Created inside the export directory unless a path is given explicitly
    #[serde(default = "default_ledger_file")]
    pub file_name: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            file_name: default_ledger_file(),
        }
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub importer: ImporterConfig,
    #[serde(default)]
    pub markup: MarkupConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl BridgeConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can layer extra providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("journal-bridge").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.importer.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "importer.binary".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.importer.timestamp_format.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "importer.timestamp_format".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.ledger.file_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ledger.file_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Ledger location: explicit path, else `<export_dir>/<file_name>`
    pub fn ledger_path(&self, export_dir: &Path, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| export_dir.join(&self.ledger.file_name))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_correct() {
        let config = BridgeConfig::default();

        assert_eq!(config.importer.binary, "dayone2");
        assert_eq!(config.importer.timestamp_format, "%Y-%m-%d %I:%M:%S %p");
        assert!(config.markup.rules_file.is_none());
        assert!(!config.markup.convert_links);
        assert_eq!(config.ledger.file_name, "import-ledger.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_local_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
[importer]
binary = "/usr/local/bin/dayone2"

[markup]
rules_file = "rules.json"
convert_links = true
"#,
            )?;

            let config: BridgeConfig = BridgeConfig::figment().extract()?;

            assert_eq!(config.importer.binary, "/usr/local/bin/dayone2");
            assert_eq!(config.importer.timestamp_format, "%Y-%m-%d %I:%M:%S %p");
            assert_eq!(config.markup.rules_file, Some(PathBuf::from("rules.json")));
            assert!(config.markup.convert_links);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG_FILE, "[ledger]\nfile_name = \"from-toml.db\"\n")?;
            jail.set_env("JOURNAL_BRIDGE_LEDGER__FILE_NAME", "from-env.db");

            let config: BridgeConfig = BridgeConfig::figment().extract()?;

            assert_eq!(config.ledger.file_name, "from-env.db");
            Ok(())
        });
    }

    #[test]
    fn empty_binary_is_rejected() {
        let mut config = BridgeConfig::default();
        config.importer.binary = "  ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("importer.binary"));
    }

    #[test]
    fn ledger_path_resolution() {
        let config = BridgeConfig::default();
        let export = Path::new("/data/export");

        assert_eq!(
            config.ledger_path(export, None),
            PathBuf::from("/data/export/import-ledger.db")
        );
        assert_eq!(
            config.ledger_path(export, Some(Path::new("/tmp/l.db"))),
            PathBuf::from("/tmp/l.db")
        );
    }
}
