// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rebuilds the cached snapshot from durable storage.
//!
//! Storage is reached only through [`SnapshotSource`]. The loader builds both
//! maps completely before handing them to the store, so the install itself is
//! a single pointer swap.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use loom_gate_core::{
	FeatureFlag, FeatureOverride, FlagId, OverrideId, OverrideKey, OverrideType,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CachedFlagStore, Snapshot, SnapshotStatus};
use crate::error::{GateServerError, Result};

/// A stored feature with its overrides, as read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
	pub id: Uuid,
	pub key: String,
	pub default_state: bool,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub overrides: Vec<OverrideRow>,
}

/// A stored override row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRow {
	pub id: Uuid,
	pub feature_flag_id: Uuid,
	pub override_type: OverrideType,
	pub target_id: String,
	pub state: bool,
}

/// Read-only full scan of features and their overrides.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
	async fn load_features(&self) -> Result<Vec<FeatureRow>>;
}

/// Converts storage rows into a snapshot, validating every row.
///
/// Any invalid row fails the whole build. When two rows normalize to the
/// same key the later one wins, and the overrides of the earlier row are
/// dropped with it.
pub fn build_snapshot(rows: Vec<FeatureRow>) -> Result<Snapshot> {
	let mut features: HashMap<String, FeatureFlag> = HashMap::with_capacity(rows.len());
	let mut overrides: HashMap<OverrideKey, bool> = HashMap::new();

	for row in rows {
		let flag = FeatureFlag::new(
			FlagId(row.id),
			&row.key,
			row.default_state,
			row.description.as_deref(),
		)
		.map_err(|source| GateServerError::InvalidRow {
			row: row.key.clone(),
			source,
		})?;

		let mut row_overrides = Vec::with_capacity(row.overrides.len());
		for override_row in &row.overrides {
			if override_row.feature_flag_id != row.id {
				return Err(GateServerError::MisplacedOverride {
					override_id: override_row.id.to_string(),
					owner: override_row.feature_flag_id.to_string(),
					feature: row.id.to_string(),
				});
			}

			let ov = FeatureOverride::new(
				OverrideId(override_row.id),
				flag.id(),
				override_row.override_type,
				&override_row.target_id,
				override_row.state,
			)
			.map_err(|source| GateServerError::InvalidRow {
				row: override_row.id.to_string(),
				source,
			})?;
			row_overrides.push(ov);
		}

		let flag_id = flag.id();
		if let Some(previous) = features.insert(flag.key().to_string(), flag) {
			let previous_id = previous.id();
			let before = overrides.len();
			if previous_id != flag_id {
				overrides.retain(|key, _| key.feature_id != previous_id);
			}
			warn!(
				feature = previous.key(),
				previous_id = %previous_id,
				dropped_overrides = before - overrides.len(),
				"duplicate feature key, keeping the later row and its overrides"
			);
		}

		for ov in row_overrides {
			if overrides.insert(ov.key(), ov.state()).is_some() {
				warn!(
					feature_id = %flag_id,
					override_type = %ov.override_type(),
					target = ov.target_id(),
					"duplicate override row, keeping the later one"
				);
			}
		}
	}

	Ok(Snapshot::new(features, overrides))
}

/// Loads rows from a [`SnapshotSource`] and installs them into the store.
pub struct SnapshotLoader {
	source: Arc<dyn SnapshotSource>,
	store: CachedFlagStore,
	/// Serializes loads so a slow scan never overwrites a newer one.
	load_lock: Mutex<()>,
}

impl SnapshotLoader {
	pub fn new(source: Arc<dyn SnapshotSource>, store: CachedFlagStore) -> Self {
		Self {
			source,
			store,
			load_lock: Mutex::new(()),
		}
	}

	pub fn store(&self) -> &CachedFlagStore {
		&self.store
	}

	/// Reads every feature and override and swaps them in as one snapshot.
	///
	/// On failure the currently installed snapshot keeps serving.
	#[instrument(skip(self))]
	pub async fn load(&self) -> Result<SnapshotStatus> {
		let _guard = self.load_lock.lock().await;

		let rows = self.source.load_features().await?;
		debug!(rows = rows.len(), "read feature rows");

		let snapshot = build_snapshot(rows)?;
		self.store.install(snapshot);

		let status = self.store.status();
		info!(
			features = status.features,
			overrides = status.overrides,
			"feature snapshot installed"
		);
		Ok(status)
	}
}

/// In-process [`SnapshotSource`] backed by a row list.
#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
	rows: RwLock<Vec<FeatureRow>>,
}

impl MemorySnapshotSource {
	pub fn new(rows: Vec<FeatureRow>) -> Self {
		Self {
			rows: RwLock::new(rows),
		}
	}

	/// Replaces the stored rows; picked up by the next load.
	pub async fn set_rows(&self, rows: Vec<FeatureRow>) {
		*self.rows.write().await = rows;
	}
}

#[async_trait]
impl SnapshotSource for MemorySnapshotSource {
	async fn load_features(&self) -> Result<Vec<FeatureRow>> {
		Ok(self.rows.read().await.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_gate_core::{EvaluationContext, EvaluationSource, FlagEvaluator, FlagLookup};

	fn feature_row(key: &str, default_state: bool) -> FeatureRow {
		FeatureRow {
			id: Uuid::new_v4(),
			key: key.to_string(),
			default_state,
			description: None,
			overrides: vec![],
		}
	}

	fn with_override(
		mut row: FeatureRow,
		override_type: OverrideType,
		target: &str,
		state: bool,
	) -> FeatureRow {
		row.overrides.push(OverrideRow {
			id: Uuid::new_v4(),
			feature_flag_id: row.id,
			override_type,
			target_id: target.to_string(),
			state,
		});
		row
	}

	struct FailingSource;

	#[async_trait]
	impl SnapshotSource for FailingSource {
		async fn load_features(&self) -> Result<Vec<FeatureRow>> {
			Err(GateServerError::Source("database unavailable".to_string()))
		}
	}

	#[test]
	fn test_build_snapshot_normalizes_rows() {
		let row = feature_row("  New-Search ", false);
		let row = with_override(row, OverrideType::Region, " in ", true);
		let row = with_override(row, OverrideType::Group, " Beta ", true);
		let id = FlagId(row.id);

		let snapshot = build_snapshot(vec![row]).unwrap();

		assert_eq!(snapshot.feature_count(), 1);
		assert_eq!(snapshot.override_count(), 2);
		assert!(snapshot.try_get_feature_by_key("new-search").is_some());
		assert_eq!(snapshot.try_get_override(id, OverrideType::Region, "IN"), Some(true));
		assert_eq!(snapshot.try_get_override(id, OverrideType::Group, "Beta"), Some(true));
	}

	#[test]
	fn test_build_snapshot_rejects_invalid_key() {
		let err = build_snapshot(vec![feature_row("bad key!", true)]).unwrap_err();
		assert!(matches!(err, GateServerError::InvalidRow { .. }));
	}

	#[test]
	fn test_build_snapshot_rejects_blank_target() {
		let row = with_override(feature_row("checkout", true), OverrideType::User, "   ", true);
		let err = build_snapshot(vec![row]).unwrap_err();
		assert!(matches!(err, GateServerError::InvalidRow { .. }));
	}

	#[test]
	fn test_build_snapshot_rejects_misplaced_override() {
		let mut row = with_override(feature_row("checkout", true), OverrideType::User, "u1", true);
		row.overrides[0].feature_flag_id = Uuid::new_v4();
		let err = build_snapshot(vec![row]).unwrap_err();
		assert!(matches!(err, GateServerError::MisplacedOverride { .. }));
	}

	#[test]
	fn test_duplicate_keys_keep_later_row() {
		let first = feature_row("checkout", false);
		let second = feature_row("CHECKOUT", true);
		let second_id = FlagId(second.id);

		let snapshot = build_snapshot(vec![first, second]).unwrap();
		let flag = snapshot.try_get_feature_by_key("checkout").unwrap();
		assert_eq!(snapshot.feature_count(), 1);
		assert_eq!(flag.id(), second_id);
		assert!(flag.default_state());
	}

	#[test]
	fn test_duplicate_keys_drop_overrides_of_replaced_row() {
		let first = with_override(feature_row("checkout", false), OverrideType::User, "u1", true);
		let first = with_override(first, OverrideType::Group, "beta", true);
		let first_id = FlagId(first.id);
		let second = feature_row("Checkout", true);
		let second = with_override(second, OverrideType::Region, "in", false);
		let second_id = FlagId(second.id);

		let snapshot = build_snapshot(vec![first, second]).unwrap();

		assert_eq!(snapshot.feature_count(), 1);
		assert_eq!(snapshot.override_count(), 1);
		assert_eq!(snapshot.try_get_override(first_id, OverrideType::User, "u1"), None);
		assert_eq!(snapshot.try_get_override(second_id, OverrideType::Region, "IN"), Some(false));
	}

	#[tokio::test]
	async fn test_load_installs_snapshot() {
		let row = with_override(feature_row("checkout", false), OverrideType::User, "u1", true);
		let source = Arc::new(MemorySnapshotSource::new(vec![row]));
		let store = CachedFlagStore::new();
		let loader = SnapshotLoader::new(source, store.clone());

		let status = loader.load().await.unwrap();
		assert_eq!(status.features, 1);
		assert_eq!(status.overrides, 1);

		let evaluator = FlagEvaluator::new(store);
		let ctx = EvaluationContext::new(Some("u1"), Vec::<String>::new(), None).unwrap();
		let result = evaluator.evaluate("checkout", &ctx).unwrap();
		assert_eq!(result.source, EvaluationSource::UserOverride);
		assert!(result.enabled);
	}

	#[tokio::test]
	async fn test_failed_load_keeps_previous_snapshot() {
		let store = CachedFlagStore::new();
		let good = SnapshotLoader::new(
			Arc::new(MemorySnapshotSource::new(vec![feature_row("checkout", true)])),
			store.clone(),
		);
		good.load().await.unwrap();

		let failing = SnapshotLoader::new(Arc::new(FailingSource), store.clone());
		let err = failing.load().await.unwrap_err();
		assert!(matches!(err, GateServerError::Source(_)));
		assert_eq!(store.feature_count(), 1);

		let invalid = SnapshotLoader::new(
			Arc::new(MemorySnapshotSource::new(vec![
				feature_row("search", true),
				feature_row("!", true),
			])),
			store.clone(),
		);
		assert!(invalid.load().await.is_err());
		assert!(store.try_get_feature_by_key("checkout").is_some());
		assert!(store.try_get_feature_by_key("search").is_none());
	}

	#[tokio::test]
	async fn test_reload_picks_up_source_changes() {
		let source = Arc::new(MemorySnapshotSource::new(vec![feature_row("checkout", false)]));
		let store = CachedFlagStore::new();
		let loader = SnapshotLoader::new(source.clone(), store.clone());
		loader.load().await.unwrap();

		source
			.set_rows(vec![feature_row("checkout", true), feature_row("search", false)])
			.await;
		let status = loader.load().await.unwrap();

		assert_eq!(status.features, 2);
		assert!(store.try_get_feature_by_key("checkout").unwrap().default_state());
	}

	#[test]
	fn test_memory_source_returns_rows() {
		let source = MemorySnapshotSource::new(vec![feature_row("checkout", true)]);
		let rows = tokio_test::block_on(source.load_features()).unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].key, "checkout");
	}

	#[test]
	fn test_rows_deserialize_from_json() {
		let json = r#"[{
			"id": "7f1d8a2e-4c4b-4f55-9a55-2f4f0a9b8c01",
			"key": "checkout",
			"default_state": false,
			"overrides": [{
				"id": "0b9d3c1e-5a3f-4d2b-8e7a-6c5d4b3a2f10",
				"feature_flag_id": "7f1d8a2e-4c4b-4f55-9a55-2f4f0a9b8c01",
				"override_type": "Region",
				"target_id": "us",
				"state": true
			}]
		}]"#;
		let rows: Vec<FeatureRow> = serde_json::from_str(json).unwrap();
		let snapshot = build_snapshot(rows).unwrap();
		assert_eq!(snapshot.override_count(), 1);
	}
}
