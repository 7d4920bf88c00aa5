// ⚙️ Configuration - dre-ledger.toml + environment overrides

use crate::error::{DreError, DreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "dre-ledger.toml";

pub const ENV_HIERARCHY_PATH: &str = "DRE_HIERARCHY_PATH";
pub const ENV_LEDGER_PATH: &str = "DRE_LEDGER_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DreConfig {
    /// Hierarchy dataset: CSV file, or Parquet file/directory with the `columnar` feature
    pub hierarchy_path: PathBuf,

    /// `;` delimited ledger file
    pub ledger_path: PathBuf,

    /// Rollup depths offered by the report page
    pub level_options: Vec<i64>,

    pub default_level: i64,

    /// Directory for the TUI log file
    pub log_dir: PathBuf,

    /// Used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for DreConfig {
    fn default() -> Self {
        DreConfig {
            hierarchy_path: PathBuf::from("data/hierarquia_dre.csv"),
            ledger_path: PathBuf::from("data/valores.csv"),
            level_options: vec![1, 2, 3, 4],
            default_level: 1,
            log_dir: PathBuf::from("logs"),
            log_filter: "info".to_string(),
        }
    }
}

impl DreConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `dre-ledger.toml` in the
    /// working directory is used when present, otherwise the defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> DreResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    debug!("No config file found, using defaults");
                    DreConfig::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> DreResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| DreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text).map_err(|e| match e {
            DreError::Config(details) => DreError::Config(format!("{}: {}", path.display(), details)),
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> DreResult<Self> {
        toml::from_str(text).map_err(|e| DreError::Config(e.to_string()))
    }

    /// Apply path overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_HIERARCHY_PATH).filter(|v| !v.trim().is_empty()) {
            self.hierarchy_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_LEDGER_PATH).filter(|v| !v.trim().is_empty()) {
            self.ledger_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> DreResult<()> {
        if self.level_options.is_empty() {
            return Err(DreError::Config("level_options must not be empty".to_string()));
        }
        if let Some(level) = self.level_options.iter().find(|&&l| l < 1) {
            return Err(DreError::Config(format!("level_options contains {}, levels start at 1", level)));
        }
        if !self.level_options.contains(&self.default_level) {
            return Err(DreError::Config(format!(
                "default_level {} is not one of level_options {:?}",
                self.default_level, self.level_options
            )));
        }
        Ok(())
    }

    /// Index of the default level within `level_options`
    pub fn default_level_index(&self) -> usize {
        self.level_options
            .iter()
            .position(|&l| l == self.default_level)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = DreConfig::default();
        assert_eq!(config.level_options, vec![1, 2, 3, 4]);
        assert_eq!(config.default_level, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DreConfig::from_toml(
            r#"
ledger_path = "/srv/dre/valores.csv"
default_level = 2
"#,
        )
        .unwrap();

        assert_eq!(config.ledger_path, PathBuf::from("/srv/dre/valores.csv"));
        assert_eq!(config.default_level, 2);
        assert_eq!(config.level_options, vec![1, 2, 3, 4]);
        assert_eq!(config.default_level_index(), 1);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = DreConfig::from_toml("level_options = \"all\"").unwrap_err();
        assert!(matches!(err, DreError::Config(_)));
    }

    #[test]
    fn test_default_level_must_be_offered() {
        let config = DreConfig {
            level_options: vec![1, 2],
            default_level: 3,
            ..DreConfig::default()
        };
        assert!(config.validate().is_err());

        let zero = DreConfig {
            level_options: vec![0, 1],
            ..DreConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_overrides_replace_paths() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_HIERARCHY_PATH, "/data/hier.parquet"),
            (ENV_LEDGER_PATH, "  "),
        ]);
        let mut config = DreConfig::default();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.hierarchy_path, PathBuf::from("/data/hier.parquet"));
        assert_eq!(config.ledger_path, DreConfig::default().ledger_path);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = DreConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dre.toml");
        fs::write(&path, "level_options = [1, 2]\nlog_filter = \"debug\"\n").unwrap();

        let config = DreConfig::from_file(&path).unwrap();
        assert_eq!(config.level_options, vec![1, 2]);
        assert_eq!(config.log_filter, "debug");
    }
}
