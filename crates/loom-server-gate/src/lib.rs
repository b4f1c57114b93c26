// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side snapshot pipeline for the Loom feature gate.
//!
//! # Architecture
//!
//! - `cache` - Atomically replaceable in-memory snapshot store
//! - `loader` - Builds snapshots from a [`SnapshotSource`] and installs them
//! - `refresh` - Periodic background reload plus on-demand refresh
//! - `config` - Layered refresh configuration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_server_gate::{load_config, CachedFlagStore, SnapshotLoader, SnapshotRefresher};
//! use loom_gate_core::{EvaluationContext, FlagEvaluator};
//!
//! let store = CachedFlagStore::new();
//! let loader = Arc::new(SnapshotLoader::new(source, store.clone()));
//! let refresher = SnapshotRefresher::start(loader, &load_config(None)?).await?;
//!
//! let evaluator = FlagEvaluator::new(store);
//! let ctx = EvaluationContext::new(Some("u123"), ["beta"], Some("in"))?;
//! let result = evaluator.evaluate("new-search", &ctx)?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod refresh;

pub use cache::{CachedFlagStore, Snapshot, SnapshotStatus};
pub use config::{load_config, SnapshotConfig, SnapshotConfigLayer};
pub use error::{ConfigError, GateServerError, Result};
pub use loader::{
	build_snapshot, FeatureRow, MemorySnapshotSource, OverrideRow, SnapshotLoader, SnapshotSource,
};
pub use refresh::{RefreshHandle, SnapshotRefresher};

// Re-export core types for convenience
pub use loom_gate_core::*;
