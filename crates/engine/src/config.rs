// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Session configuration.
//!
//! Awaited operations wait forever by default. A timeout can be configured per
//! kind of operation; it is read from TOML with durations in milliseconds:
//!
//! ```toml
//! ready_timeout_ms = 30000
//! step_timeout_ms = 5000
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Timeouts of the awaited session operations. `None` waits indefinitely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound on `ready()`
    #[serde(rename = "ready_timeout_ms", with = "millis", skip_serializing_if = "Option::is_none")]
    pub ready_timeout: Option<Duration>,
    /// Bound on every stepping operation
    #[serde(rename = "step_timeout_ms", with = "millis", skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<Duration>,
    /// Bound on waiting for outstanding decodes
    #[serde(rename = "decode_timeout_ms", with = "millis", skip_serializing_if = "Option::is_none")]
    pub decode_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Set the timeout of `ready()`.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Set the timeout of stepping operations.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Set the timeout of decode waits.
    pub fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = Some(timeout);
        self
    }

    /// Default config file location (~/.sdb.toml).
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sdb.toml"))
    }

    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).wrap_err("Failed to parse config file as TOML")?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;
        fs::write(path, content)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(|duration| duration.as_millis() as u64).serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
