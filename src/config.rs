//! Runtime configuration
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "order-reconcile";
pub const CONFIG_ENV_PREFIX: &str = "ORDER_RECONCILE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Directory of the sled database.
    pub db_path: PathBuf,
    /// Remove the database when the last handle is dropped.
    pub temporary: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("orders.db"),
            temporary: false,
            log_filter: "order_reconcile=info".to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from file and environment.
    ///
    /// Later sources override earlier ones:
    /// 1. `order-reconcile.yaml` in the current directory, if present
    /// 2. the file at `path`, if given
    /// 3. `ORDER_RECONCILE__*` environment variables, e.g. `ORDER_RECONCILE__DB_PATH`
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Throwaway database at `db_path`, for tests and demos.
    pub fn temporary_at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            temporary: true,
            ..Self::default()
        }
    }

    pub fn sled_config(&self) -> sled::Config {
        sled::Config::new()
            .path(&self.db_path)
            .temporary(self.temporary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ReconcileConfig::default();
        assert_eq!(config.db_path, PathBuf::from("orders.db"));
        assert!(!config.temporary);
        assert_eq!(config.log_filter, "order_reconcile=info");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconcile.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "db_path: /tmp/orders-test.db").unwrap();
        writeln!(file, "temporary: true").unwrap();

        let config = ReconcileConfig::load(path.to_str()).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/orders-test.db"));
        assert!(config.temporary);
        assert_eq!(config.log_filter, "order_reconcile=info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(ReconcileConfig::load(Some("/definitely/not/here.yaml")).is_err());
    }
}
