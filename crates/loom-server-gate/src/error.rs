// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised while loading and refreshing snapshots or reading configuration.
#[derive(Debug, Error)]
pub enum GateServerError {
	#[error(transparent)]
	Core(#[from] loom_gate_core::GateError),

	#[error("invalid row '{row}': {source}")]
	InvalidRow {
		row: String,
		#[source]
		source: loom_gate_core::ValidationError,
	},

	#[error("override {override_id} references feature {owner} but is listed under {feature}")]
	MisplacedOverride {
		override_id: String,
		owner: String,
		feature: String,
	},

	#[error("snapshot source failed: {0}")]
	Source(String),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("snapshot refresher has shut down")]
	RefresherClosed,
}

impl From<loom_gate_core::ValidationError> for GateServerError {
	fn from(err: loom_gate_core::ValidationError) -> Self {
		GateServerError::Core(err.into())
	}
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("failed to read config file {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
}

pub type Result<T> = std::result::Result<T, GateServerError>;
