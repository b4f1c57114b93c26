// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot refresh configuration.
//!
//! Layered like the rest of the server config: built-in defaults, then an
//! optional TOML file, then `LOOM_GATE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const ENV_REFRESH_ENABLED: &str = "LOOM_GATE_REFRESH_ENABLED";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "LOOM_GATE_REFRESH_INTERVAL_SECS";
pub const ENV_LOAD_ON_START: &str = "LOOM_GATE_LOAD_ON_START";

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Upper bound for the refresh interval (one week).
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotConfigLayer {
	pub refresh_enabled: Option<bool>,
	pub refresh_interval_secs: Option<u64>,
	pub load_on_start: Option<bool>,
}

impl SnapshotConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.refresh_enabled.is_some() {
			self.refresh_enabled = other.refresh_enabled;
		}
		if other.refresh_interval_secs.is_some() {
			self.refresh_interval_secs = other.refresh_interval_secs;
		}
		if other.load_on_start.is_some() {
			self.load_on_start = other.load_on_start;
		}
	}

	pub fn finalize(self) -> SnapshotConfig {
		SnapshotConfig {
			refresh_enabled: self.refresh_enabled.unwrap_or(true),
			refresh_interval_secs: self
				.refresh_interval_secs
				.unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
			load_on_start: self.load_on_start.unwrap_or(true),
		}
	}

	pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(s)?)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.display().to_string(),
			source,
		})?;
		Self::from_toml_str(&content)
	}

	/// Reads the `LOOM_GATE_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads variables through `lookup`; unset variables leave the field empty.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Ok(Self {
			refresh_enabled: lookup(ENV_REFRESH_ENABLED)
				.map(|v| parse_bool(ENV_REFRESH_ENABLED, &v))
				.transpose()?,
			refresh_interval_secs: lookup(ENV_REFRESH_INTERVAL_SECS)
				.map(|v| {
					v.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
						key: ENV_REFRESH_INTERVAL_SECS.to_string(),
						message: e.to_string(),
					})
				})
				.transpose()?,
			load_on_start: lookup(ENV_LOAD_ON_START)
				.map(|v| parse_bool(ENV_LOAD_ON_START, &v))
				.transpose()?,
		})
	}
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
	match value.trim().to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		other => Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("expected a boolean, got '{other}'"),
		}),
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotConfig {
	/// Run the periodic background refresh.
	pub refresh_enabled: bool,
	pub refresh_interval_secs: u64,
	/// Load a snapshot before the refresher reports ready.
	pub load_on_start: bool,
}

impl SnapshotConfig {
	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.refresh_enabled && self.refresh_interval_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "refresh_interval_secs".to_string(),
				message: "must be greater than zero when refresh is enabled".to_string(),
			});
		}
		if self.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
			return Err(ConfigError::InvalidValue {
				key: "refresh_interval_secs".to_string(),
				message: format!("must be at most {MAX_REFRESH_INTERVAL_SECS} seconds"),
			});
		}
		Ok(())
	}
}

impl Default for SnapshotConfig {
	fn default() -> Self {
		SnapshotConfigLayer::default().finalize()
	}
}

/// Loads configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_GATE_*`)
/// 2. Config file, if given
/// 3. Built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<SnapshotConfig, ConfigError> {
	let mut merged = SnapshotConfigLayer::default();

	if let Some(path) = path {
		debug!(path = %path.display(), "loading snapshot config file");
		merged.merge(SnapshotConfigLayer::from_file(path)?);
	}
	merged.merge(SnapshotConfigLayer::from_env()?);

	let config = merged.finalize();
	config.validate()?;
	Ok(config)
}
