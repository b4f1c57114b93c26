// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::error::{GateError, Result, ValidationError};
use crate::flag::{FeatureFlag, FlagId, OverrideType};
use crate::normalize::normalize_key;

/// What decided the outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationSource {
	Default,
	UserOverride,
	GroupOverride,
	RegionOverride,
}

impl std::fmt::Display for EvaluationSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EvaluationSource::Default => write!(f, "Default"),
			EvaluationSource::UserOverride => write!(f, "UserOverride"),
			EvaluationSource::GroupOverride => write!(f, "GroupOverride"),
			EvaluationSource::RegionOverride => write!(f, "RegionOverride"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub enabled: bool,
	pub source: EvaluationSource,
}

impl EvaluationResult {
	pub fn new(enabled: bool, source: EvaluationSource) -> Self {
		Self { enabled, source }
	}
}

/// Read-only lookups over one consistent set of flags and overrides.
///
/// Implementations must not perform I/O.
pub trait FlagLookup: Send + Sync {
	fn try_get_feature_by_key(&self, normalized_key: &str) -> Option<&FeatureFlag>;

	fn try_get_override(
		&self,
		feature_id: FlagId,
		override_type: OverrideType,
		normalized_target: &str,
	) -> Option<bool>;
}

/// A source of flag snapshots the evaluator reads from.
pub trait FlagStore: Send + Sync {
	/// Pins the currently installed snapshot.
	///
	/// Every lookup made through the returned view resolves against the same
	/// data, even if the store is replaced while the view is held.
	fn snapshot(&self) -> Arc<dyn FlagLookup>;
}

impl<T: FlagStore + ?Sized> FlagStore for Arc<T> {
	fn snapshot(&self) -> Arc<dyn FlagLookup> {
		(**self).snapshot()
	}
}

/// One tier of the precedence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
	User,
	Group,
	Region,
}

impl Stage {
	/// Precedence order: first match wins.
	const ORDER: [Stage; 3] = [Stage::User, Stage::Group, Stage::Region];

	fn override_type(self) -> OverrideType {
		match self {
			Stage::User => OverrideType::User,
			Stage::Group => OverrideType::Group,
			Stage::Region => OverrideType::Region,
		}
	}

	fn source(self) -> EvaluationSource {
		match self {
			Stage::User => EvaluationSource::UserOverride,
			Stage::Group => EvaluationSource::GroupOverride,
			Stage::Region => EvaluationSource::RegionOverride,
		}
	}

	/// Candidate targets in the order they are tried. Groups keep caller order.
	fn targets(self, context: &EvaluationContext) -> &[String] {
		match self {
			Stage::User => context.user_targets(),
			Stage::Group => context.group_ids(),
			Stage::Region => context.region_targets(),
		}
	}

	fn resolve(
		self,
		lookup: &dyn FlagLookup,
		feature: &FeatureFlag,
		context: &EvaluationContext,
	) -> Option<bool> {
		let override_type = self.override_type();
		self.targets(context).iter().find_map(|target| {
			lookup.try_get_override(feature.id(), override_type, target)
		})
	}
}

/// Decides whether a feature is enabled for a context.
///
/// Precedence: user override > group override > region override > default.
/// Within the group tier the first group (in caller order) that has an
/// override wins; there is no stored priority between groups.
pub struct FlagEvaluator<S> {
	store: S,
}

impl<S: FlagStore> FlagEvaluator<S> {
	pub fn new(store: S) -> Self {
		Self { store }
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	/// Evaluates `feature_key` for `context`.
	///
	/// Fails with a validation error for a malformed key and with
	/// [`GateError::FeatureNotFound`] if the key is not in the current snapshot.
	pub fn evaluate(
		&self,
		feature_key: &str,
		context: &EvaluationContext,
	) -> Result<EvaluationResult> {
		let key = normalize_key(feature_key);
		FeatureFlag::validate_key(&key)?;

		let view = self.store.snapshot();
		let feature = view
			.try_get_feature_by_key(&key)
			.ok_or_else(|| GateError::FeatureNotFound(key.clone()))?;

		let result = Stage::ORDER
			.iter()
			.find_map(|stage| {
				stage
					.resolve(view.as_ref(), feature, context)
					.map(|enabled| EvaluationResult::new(enabled, stage.source()))
			})
			.unwrap_or_else(|| {
				EvaluationResult::new(feature.default_state(), EvaluationSource::Default)
			});

		Ok(result)
	}

	/// Like [`evaluate`](Self::evaluate) for callers whose context may be missing.
	pub fn try_evaluate(
		&self,
		feature_key: &str,
		context: Option<&EvaluationContext>,
	) -> Result<EvaluationResult> {
		let context = context.ok_or(ValidationError::ContextMissing)?;
		self.evaluate(feature_key, context)
	}
}
