// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical forms for keys, regions and override targets.
//!
//! These are applied wherever a value enters the system (user input, storage
//! rows, snapshot install) so that `"New-Search"` and `"new-search"` always
//! collide.

/// Canonical feature key: trimmed and lowercased.
pub fn normalize_key(key: &str) -> String {
	key.trim().to_lowercase()
}

/// Canonical region code: trimmed and uppercased (`" in "` -> `"IN"`).
pub fn normalize_region(region: &str) -> String {
	region.trim().to_uppercase()
}

/// Canonical user/group target: trimmed, case preserved.
///
/// Region targets go through [`normalize_region`] instead.
pub fn normalize_target(target: &str) -> String {
	target.trim().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_normalize_key() {
		assert_eq!(normalize_key("  New-Search "), "new-search");
		assert_eq!(normalize_key("CHECKOUT.V2"), "checkout.v2");
		assert_eq!(normalize_key(""), "");
	}

	#[test]
	fn test_normalize_region() {
		assert_eq!(normalize_region(" in "), "IN");
		assert_eq!(normalize_region("eu-west"), "EU-WEST");
		assert_eq!(normalize_region("   "), "");
	}

	#[test]
	fn test_normalize_target_preserves_case() {
		assert_eq!(normalize_target("  User-123 "), "User-123");
		assert_eq!(normalize_target("Beta"), "Beta");
	}

	proptest! {
		#[test]
		fn normalize_key_is_idempotent(s in "[ a-zA-Z0-9._-]{0,40}") {
			let once = normalize_key(&s);
			prop_assert_eq!(normalize_key(&once), once.clone());
		}

		#[test]
		fn normalize_region_is_idempotent(s in "[ a-zA-Z0-9-]{0,20}") {
			let once = normalize_region(&s);
			prop_assert_eq!(normalize_region(&once), once.clone());
		}

		#[test]
		fn differently_cased_keys_collide(s in "[a-z0-9._-]{2,30}") {
			prop_assert_eq!(normalize_key(&s.to_uppercase()), normalize_key(&s));
		}
	}
}
