// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::normalize::{normalize_key, normalize_region, normalize_target};

/// Unique identifier for a feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagId(pub Uuid);

impl FlagId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn is_nil(&self) -> bool {
		self.0.is_nil()
	}
}

impl Default for FlagId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for FlagId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for FlagId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Unique identifier for a feature override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverrideId(pub Uuid);

impl OverrideId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn is_nil(&self) -> bool {
		self.0.is_nil()
	}
}

impl Default for OverrideId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for OverrideId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A named boolean toggle with a default state.
///
/// Values are immutable once built. An update produces a new instance which
/// reaches readers through the next snapshot rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureFlag {
	id: FlagId,
	/// Normalized key: "checkout.v2", "new-search"
	key: String,
	default_state: bool,
	description: Option<String>,
}

impl FeatureFlag {
	pub const KEY_MIN_LEN: usize = 2;
	pub const KEY_MAX_LEN: usize = 100;

	/// Builds a flag, normalizing the key and description.
	///
	/// Fails if `id` is nil or the normalized key is malformed.
	pub fn new(
		id: FlagId,
		key: &str,
		default_state: bool,
		description: Option<&str>,
	) -> Result<Self, ValidationError> {
		if id.is_nil() {
			return Err(ValidationError::NilId("feature id"));
		}

		let key = normalize_key(key);
		Self::validate_key(&key)?;

		Ok(Self {
			id,
			key,
			default_state,
			description: clean_description(description),
		})
	}

	/// Validates an already-normalized feature key.
	///
	/// Valid keys:
	/// - 2-100 characters
	/// - Pattern: `^[a-z0-9._-]+$`
	pub fn validate_key(normalized_key: &str) -> Result<(), ValidationError> {
		if normalized_key.trim().is_empty() {
			return Err(ValidationError::FeatureKeyRequired);
		}

		let len = normalized_key.chars().count();
		if !(Self::KEY_MIN_LEN..=Self::KEY_MAX_LEN).contains(&len) {
			return Err(ValidationError::FeatureKeyLength {
				key: normalized_key.to_string(),
				min: Self::KEY_MIN_LEN,
				max: Self::KEY_MAX_LEN,
			});
		}

		let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c);
		if !normalized_key.chars().all(allowed) {
			return Err(ValidationError::FeatureKeyCharacters(
				normalized_key.to_string(),
			));
		}

		Ok(())
	}

	pub fn id(&self) -> FlagId {
		self.id
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn default_state(&self) -> bool {
		self.default_state
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	/// Returns a copy of this flag with a different default state.
	pub fn with_default_state(&self, default_state: bool) -> Self {
		Self {
			default_state,
			..self.clone()
		}
	}

	/// Returns a copy of this flag with a different description.
	pub fn with_description(&self, description: Option<&str>) -> Self {
		Self {
			description: clean_description(description),
			..self.clone()
		}
	}
}

fn clean_description(description: Option<&str>) -> Option<String> {
	description
		.map(str::trim)
		.filter(|d| !d.is_empty())
		.map(str::to_string)
}

/// Scope of an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverrideType {
	User,
	Group,
	Region,
}

impl OverrideType {
	/// Normalizes a raw target for this override scope.
	///
	/// Region targets are uppercased; user and group targets are only trimmed.
	pub fn normalize_target(&self, raw: &str) -> String {
		match self {
			OverrideType::Region => normalize_region(raw),
			OverrideType::User | OverrideType::Group => normalize_target(raw),
		}
	}
}

impl std::fmt::Display for OverrideType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OverrideType::User => write!(f, "user"),
			OverrideType::Group => write!(f, "group"),
			OverrideType::Region => write!(f, "region"),
		}
	}
}

/// Forces a boolean state for one user, group or region on one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureOverride {
	id: OverrideId,
	feature_flag_id: FlagId,
	override_type: OverrideType,
	/// Normalized for `override_type`.
	target_id: String,
	state: bool,
}

impl FeatureOverride {
	pub const TARGET_MAX_LEN: usize = 200;

	pub fn new(
		id: OverrideId,
		feature_flag_id: FlagId,
		override_type: OverrideType,
		target_id: &str,
		state: bool,
	) -> Result<Self, ValidationError> {
		if id.is_nil() {
			return Err(ValidationError::NilId("override id"));
		}
		if feature_flag_id.is_nil() {
			return Err(ValidationError::NilId("feature flag id"));
		}

		let target_id = override_type.normalize_target(target_id);
		if target_id.is_empty() {
			return Err(ValidationError::TargetRequired);
		}
		if target_id.chars().count() > Self::TARGET_MAX_LEN {
			return Err(ValidationError::TargetTooLong {
				max: Self::TARGET_MAX_LEN,
			});
		}

		Ok(Self {
			id,
			feature_flag_id,
			override_type,
			target_id,
			state,
		})
	}

	pub fn id(&self) -> OverrideId {
		self.id
	}

	pub fn feature_flag_id(&self) -> FlagId {
		self.feature_flag_id
	}

	pub fn override_type(&self) -> OverrideType {
		self.override_type
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	pub fn state(&self) -> bool {
		self.state
	}

	/// The uniqueness key of this override.
	pub fn key(&self) -> OverrideKey {
		OverrideKey {
			feature_id: self.feature_flag_id,
			override_type: self.override_type,
			target: self.target_id.clone(),
		}
	}
}

/// `(feature id, override type, normalized target)`: at most one override per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideKey {
	pub feature_id: FlagId,
	pub override_type: OverrideType,
	pub target: String,
}

impl OverrideKey {
	/// Builds a key, normalizing `target` for `override_type`.
	pub fn new(feature_id: FlagId, override_type: OverrideType, target: &str) -> Self {
		Self {
			feature_id,
			override_type,
			target: override_type.normalize_target(target),
		}
	}
}
