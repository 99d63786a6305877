//! TOML configuration.
//!
//! ```toml
//! [merge]
//! retention_window = 500
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;

use extstore_error::{ExtError, Result};
use extstore_merge::MergeOptions;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub merge: MergeOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `EXTSTORE_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per event instead of text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl StoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ExtError::io_at(path, err))?;
        Self::from_toml_str(&text)
            .map_err(|err| ExtError::config(format!("{}: {err}", path.display())))
    }

    /// `load(path)` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| ExtError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| ExtError::config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.merge.validate()?;
        EnvFilter::try_new(&self.logging.level).map_err(|err| {
            ExtError::config(format!("invalid log level {:?}: {err}", self.logging.level))
        })?;
        Ok(())
    }
}
