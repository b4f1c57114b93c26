// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory snapshot store for feature evaluation.
//!
//! The store holds exactly one immutable [`Snapshot`] at a time. Replacing it
//! swaps a single pointer, so readers never block on a refresh and never see
//! features from one load paired with overrides from another.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use loom_gate_core::{
	normalize_key, FeatureFlag, FlagId, FlagLookup, FlagStore, OverrideKey, OverrideType,
};
use serde::Serialize;
use tracing::warn;

/// A complete, consistent copy of all flags and overrides.
#[derive(Debug)]
pub struct Snapshot {
	/// Normalized feature key -> flag.
	features: HashMap<String, FeatureFlag>,
	/// (feature, scope) -> normalized target -> state.
	overrides: HashMap<(FlagId, OverrideType), HashMap<String, bool>>,
	override_count: usize,
	loaded_at: DateTime<Utc>,
}

impl Snapshot {
	/// Builds a snapshot, re-normalizing override targets.
	///
	/// Features are indexed by their own normalized key; the map key the
	/// caller supplied is only checked against it. If two flags share a key,
	/// the one with the lowest id is kept.
	pub fn new(
		features: HashMap<String, FeatureFlag>,
		overrides: HashMap<OverrideKey, bool>,
	) -> Self {
		let mut indexed_features: HashMap<String, FeatureFlag> =
			HashMap::with_capacity(features.len());
		for (key, flag) in features {
			if normalize_key(&key) != flag.key() {
				warn!(key = %key, feature = flag.key(), "feature listed under a different key");
			}
			match indexed_features.entry(flag.key().to_string()) {
				Entry::Occupied(mut existing) => {
					if flag.id().0 < existing.get().id().0 {
						existing.insert(flag);
					}
				}
				Entry::Vacant(slot) => {
					slot.insert(flag);
				}
			}
		}

		let mut indexed: HashMap<(FlagId, OverrideType), HashMap<String, bool>> = HashMap::new();
		for (key, state) in overrides {
			let target = key.override_type.normalize_target(&key.target);
			indexed
				.entry((key.feature_id, key.override_type))
				.or_default()
				.insert(target, state);
		}
		let override_count = indexed.values().map(HashMap::len).sum();

		Self {
			features: indexed_features,
			overrides: indexed,
			override_count,
			loaded_at: Utc::now(),
		}
	}

	pub fn empty() -> Self {
		Self::new(HashMap::new(), HashMap::new())
	}

	pub fn feature_count(&self) -> usize {
		self.features.len()
	}

	pub fn override_count(&self) -> usize {
		self.override_count
	}

	/// When this snapshot was built.
	pub fn loaded_at(&self) -> DateTime<Utc> {
		self.loaded_at
	}

	pub fn features(&self) -> impl Iterator<Item = &FeatureFlag> {
		self.features.values()
	}
}

impl Default for Snapshot {
	fn default() -> Self {
		Self::empty()
	}
}

impl FlagLookup for Snapshot {
	fn try_get_feature_by_key(&self, normalized_key: &str) -> Option<&FeatureFlag> {
		self.features
			.get(normalized_key)
			.or_else(|| self.features.get(&normalize_key(normalized_key)))
	}

	fn try_get_override(
		&self,
		feature_id: FlagId,
		override_type: OverrideType,
		normalized_target: &str,
	) -> Option<bool> {
		let targets = self.overrides.get(&(feature_id, override_type))?;
		targets
			.get(normalized_target)
			.or_else(|| targets.get(&override_type.normalize_target(normalized_target)))
			.copied()
	}
}

/// Point-in-time counts of the installed snapshot, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotStatus {
	pub features: usize,
	pub overrides: usize,
	pub loaded_at: DateTime<Utc>,
}

/// Shared, atomically replaceable snapshot store.
///
/// Cloning is cheap and every clone sees the same current snapshot.
#[derive(Debug, Clone)]
pub struct CachedFlagStore {
	inner: Arc<ArcSwap<Snapshot>>,
}

impl CachedFlagStore {
	/// Creates a store holding an empty snapshot.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ArcSwap::from_pointee(Snapshot::empty())),
		}
	}

	/// Pins the current snapshot.
	pub fn current(&self) -> Arc<Snapshot> {
		self.inner.load_full()
	}

	/// Installs `snapshot` in one step and returns the one it replaced.
	pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
		self.inner.swap(Arc::new(snapshot))
	}

	/// Replaces both maps at once.
	pub fn replace_snapshot(
		&self,
		features: HashMap<String, FeatureFlag>,
		overrides: HashMap<OverrideKey, bool>,
	) {
		self.install(Snapshot::new(features, overrides));
	}

	pub fn try_get_feature_by_key(&self, normalized_key: &str) -> Option<FeatureFlag> {
		self.inner.load().try_get_feature_by_key(normalized_key).cloned()
	}

	pub fn try_get_override(
		&self,
		feature_id: FlagId,
		override_type: OverrideType,
		normalized_target: &str,
	) -> Option<bool> {
		self.inner
			.load()
			.try_get_override(feature_id, override_type, normalized_target)
	}

	pub fn feature_count(&self) -> usize {
		self.inner.load().feature_count()
	}

	pub fn override_count(&self) -> usize {
		self.inner.load().override_count()
	}

	/// Counts and load time, all read from the same snapshot.
	pub fn status(&self) -> SnapshotStatus {
		let snapshot = self.inner.load();
		SnapshotStatus {
			features: snapshot.feature_count(),
			overrides: snapshot.override_count(),
			loaded_at: snapshot.loaded_at(),
		}
	}
}

impl Default for CachedFlagStore {
	fn default() -> Self {
		Self::new()
	}
}

impl FlagStore for CachedFlagStore {
	fn snapshot(&self) -> Arc<dyn FlagLookup> {
		self.inner.load_full()
	}
}
