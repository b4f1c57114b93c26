// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Malformed input reaching the gate core.
///
/// Each variant names the rule that was violated so callers can surface a
/// precise message without parsing strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("context cannot be null")]
	ContextMissing,

	#[error("feature key is required")]
	FeatureKeyRequired,

	#[error("feature key '{key}' must be between {min} and {max} characters")]
	FeatureKeyLength { key: String, min: usize, max: usize },

	#[error("feature key '{0}' contains invalid characters (allowed: a-z, 0-9, '.', '_', '-')")]
	FeatureKeyCharacters(String),

	#[error("{0} cannot be empty")]
	NilId(&'static str),

	#[error("override target is required")]
	TargetRequired,

	#[error("override target is too long (max {max})")]
	TargetTooLong { max: usize },

	#[error("user id is too long (max {max})")]
	UserIdTooLong { max: usize },

	#[error("region is too long (max {max})")]
	RegionTooLong { max: usize },

	#[error("too many groups provided (max {max})")]
	TooManyGroups { max: usize },

	#[error("group id '{group_id}' is too long (max {max})")]
	GroupIdTooLong { group_id: String, max: usize },
}

/// Errors returned by feature evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("feature '{0}' was not found")]
	FeatureNotFound(String),
}

impl GateError {
	pub fn is_validation(&self) -> bool {
		matches!(self, GateError::Validation(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, GateError::FeatureNotFound(_))
	}
}

pub type Result<T> = std::result::Result<T, GateError>;
