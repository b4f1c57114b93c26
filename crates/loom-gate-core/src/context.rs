// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::normalize::{normalize_region, normalize_target};

/// Maximum length of a user id.
pub const MAX_USER_ID_LEN: usize = 200;
/// Maximum length of a region code.
pub const MAX_REGION_LEN: usize = 50;
/// Maximum number of groups in one context.
pub const MAX_GROUPS: usize = 100;
/// Maximum length of a single group id.
pub const MAX_GROUP_ID_LEN: usize = 200;

/// Normalized, validated identity of the caller.
///
/// Only obtainable through [`EvaluationContext::new`], [`EvaluationContext::anonymous`]
/// or [`TryFrom<ContextInput>`], so every instance satisfies the length limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationContext {
	user_id: Option<String>,
	/// Caller order is significant: the first group with an override wins.
	group_ids: Vec<String>,
	region: Option<String>,
}

impl EvaluationContext {
	/// Builds a context from raw caller input.
	///
	/// - `user_id` is trimmed; blank becomes absent
	/// - groups are trimmed, blanks dropped, case-insensitive duplicates removed
	///   keeping the first occurrence (and its casing), order preserved
	/// - `region` is uppercased; blank becomes absent
	pub fn new<I, S>(
		user_id: Option<&str>,
		group_ids: I,
		region: Option<&str>,
	) -> Result<Self, ValidationError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let user_id = user_id
			.map(normalize_target)
			.filter(|u| !u.is_empty());
		let region = region.map(normalize_region).filter(|r| !r.is_empty());

		let mut seen = HashSet::new();
		let group_ids = group_ids
			.into_iter()
			.map(|g| normalize_target(g.as_ref()))
			.filter(|g| !g.is_empty())
			.filter(|g| seen.insert(g.to_lowercase()))
			.collect();

		let ctx = Self {
			user_id,
			group_ids,
			region,
		};
		ctx.validate()?;
		Ok(ctx)
	}

	/// A context with no identity; always resolves to region-less defaults.
	pub fn anonymous() -> Self {
		Self::default()
	}

	fn validate(&self) -> Result<(), ValidationError> {
		if let Some(user_id) = &self.user_id {
			if user_id.chars().count() > MAX_USER_ID_LEN {
				return Err(ValidationError::UserIdTooLong {
					max: MAX_USER_ID_LEN,
				});
			}
		}

		if self.group_ids.len() > MAX_GROUPS {
			return Err(ValidationError::TooManyGroups { max: MAX_GROUPS });
		}

		if let Some(group_id) = self
			.group_ids
			.iter()
			.find(|g| g.chars().count() > MAX_GROUP_ID_LEN)
		{
			return Err(ValidationError::GroupIdTooLong {
				group_id: group_id.clone(),
				max: MAX_GROUP_ID_LEN,
			});
		}

		if let Some(region) = &self.region {
			if region.chars().count() > MAX_REGION_LEN {
				return Err(ValidationError::RegionTooLong {
					max: MAX_REGION_LEN,
				});
			}
		}

		Ok(())
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	pub fn group_ids(&self) -> &[String] {
		&self.group_ids
	}

	pub fn region(&self) -> Option<&str> {
		self.region.as_deref()
	}

	/// User id as a zero- or one-element slice, for uniform stage lookups.
	pub(crate) fn user_targets(&self) -> &[String] {
		self.user_id.as_slice()
	}

	pub(crate) fn region_targets(&self) -> &[String] {
		self.region.as_slice()
	}
}

/// Raw, unvalidated context as received by a request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInput {
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub group_ids: Option<Vec<String>>,
	#[serde(default)]
	pub region: Option<String>,
}

impl ContextInput {
	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
		self.group_ids
			.get_or_insert_with(Vec::new)
			.push(group_id.into());
		self
	}

	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into());
		self
	}
}

impl TryFrom<ContextInput> for EvaluationContext {
	type Error = ValidationError;

	fn try_from(input: ContextInput) -> Result<Self, Self::Error> {
		EvaluationContext::new(
			input.user_id.as_deref(),
			input.group_ids.unwrap_or_default(),
			input.region.as_deref(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_normalizes_raw_input() {
		let ctx = EvaluationContext::new(
			Some("  u1  "),
			["BETA", "beta", "admin", ""],
			Some("in"),
		)
		.unwrap();

		assert_eq!(ctx.user_id(), Some("u1"));
		assert_eq!(ctx.group_ids(), ["BETA".to_string(), "admin".to_string()]);
		assert_eq!(ctx.region(), Some("IN"));
	}

	#[test]
	fn test_first_occurrence_casing_wins() {
		let ctx = EvaluationContext::new(None, ["beta", "BETA", " Admin ", "admin"], None).unwrap();
		assert_eq!(ctx.group_ids(), ["beta".to_string(), "Admin".to_string()]);
	}

	#[test]
	fn test_blank_values_become_absent() {
		let ctx = EvaluationContext::new(Some("   "), ["  ", ""], Some(" ")).unwrap();
		assert!(ctx.user_id().is_none());
		assert!(ctx.group_ids().is_empty());
		assert!(ctx.region().is_none());
		assert_eq!(ctx, EvaluationContext::anonymous());
	}

	#[test]
	fn test_rejects_long_user_id() {
		let user = "u".repeat(MAX_USER_ID_LEN + 1);
		let err = EvaluationContext::new(Some(&user), Vec::<String>::new(), None).unwrap_err();
		assert_eq!(err, ValidationError::UserIdTooLong { max: 200 });
	}

	#[test]
	fn test_accepts_user_id_at_limit() {
		let user = "u".repeat(MAX_USER_ID_LEN);
		assert!(EvaluationContext::new(Some(&user), Vec::<String>::new(), None).is_ok());
	}

	#[test]
	fn test_rejects_long_region() {
		let region = "r".repeat(MAX_REGION_LEN + 1);
		let err = EvaluationContext::new(None, Vec::<String>::new(), Some(&region)).unwrap_err();
		assert_eq!(err, ValidationError::RegionTooLong { max: 50 });
	}

	#[test]
	fn test_rejects_too_many_groups() {
		let groups: Vec<String> = (0..=MAX_GROUPS).map(|i| format!("g{i}")).collect();
		let err = EvaluationContext::new(None, groups, None).unwrap_err();
		assert_eq!(err, ValidationError::TooManyGroups { max: 100 });
	}

	#[test]
	fn test_duplicate_groups_do_not_count_toward_limit() {
		let groups: Vec<String> = (0..150)
			.map(|i| if i % 2 == 0 { "g".to_string() } else { "G".to_string() })
			.collect();
		let ctx = EvaluationContext::new(None, groups, None).unwrap();
		assert_eq!(ctx.group_ids(), ["g".to_string()]);
	}

	#[test]
	fn test_rejects_long_group_id() {
		let group = "g".repeat(MAX_GROUP_ID_LEN + 1);
		let err = EvaluationContext::new(None, [group.as_str()], None).unwrap_err();
		assert!(matches!(err, ValidationError::GroupIdTooLong { max: 200, .. }));
	}

	#[test]
	fn test_try_from_input() {
		let input = ContextInput::default()
			.with_user_id(" u1 ")
			.with_group("beta")
			.with_group("Beta")
			.with_region("us");
		let ctx = EvaluationContext::try_from(input).unwrap();
		assert_eq!(ctx.user_id(), Some("u1"));
		assert_eq!(ctx.group_ids(), ["beta".to_string()]);
		assert_eq!(ctx.region(), Some("US"));
	}

	#[test]
	fn test_input_deserializes_camel_case() {
		let input: ContextInput =
			serde_json::from_str(r#"{"userId":"u1","groupIds":["a","b"],"region":"in"}"#).unwrap();
		assert_eq!(input.user_id.as_deref(), Some("u1"));
		assert_eq!(input.group_ids, Some(vec!["a".to_string(), "b".to_string()]));

		let empty: ContextInput = serde_json::from_str("{}").unwrap();
		assert_eq!(EvaluationContext::try_from(empty).unwrap(), EvaluationContext::anonymous());
	}

	proptest! {
		#[test]
		fn groups_are_unique_ignoring_case(
			groups in prop::collection::vec("[a-zA-Z]{1,5}", 0..30),
		) {
			let ctx = EvaluationContext::new(None, &groups, None).unwrap();
			let lowered: HashSet<String> =
				ctx.group_ids().iter().map(|g| g.to_lowercase()).collect();
			prop_assert_eq!(lowered.len(), ctx.group_ids().len());
		}

		#[test]
		fn group_order_follows_first_occurrence(
			groups in prop::collection::vec("[a-z]{1,3}", 0..30),
		) {
			let ctx = EvaluationContext::new(None, &groups, None).unwrap();
			let mut expected: Vec<String> = Vec::new();
			for g in &groups {
				if !expected.contains(g) {
					expected.push(g.clone());
				}
			}
			prop_assert_eq!(ctx.group_ids(), expected.as_slice());
		}

		#[test]
		fn region_is_always_uppercase(region in "[a-z]{1,10}") {
			let expected = region.to_uppercase();
			let ctx = EvaluationContext::new(None, Vec::<String>::new(), Some(&region)).unwrap();
			prop_assert_eq!(ctx.region(), Some(expected.as_str()));
		}
	}
}
