// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom feature gate.
//!
//! This crate decides whether a feature is enabled for a request by consulting
//! user, group and region overrides over a default state. It performs no I/O:
//! lookups go through the [`FlagStore`] abstraction, implemented by the cached
//! snapshot store in `loom-server-gate`.
//!
//! # Overview
//!
//! - [`normalize`]: canonical forms for keys, regions and targets
//! - [`FeatureFlag`] / [`FeatureOverride`]: validated domain values
//! - [`EvaluationContext`]: normalized caller identity
//! - [`FlagEvaluator`]: precedence User > Group > Region > Default
//!
//! # Example
//!
//! ```ignore
//! use loom_gate_core::{EvaluationContext, EvaluationSource, FlagEvaluator};
//!
//! let evaluator = FlagEvaluator::new(store);
//! let ctx = EvaluationContext::new(Some("u123"), ["beta", "admin"], Some("in"))?;
//! let result = evaluator.evaluate("new-search", &ctx)?;
//! if result.source == EvaluationSource::GroupOverride {
//!     // "beta" or "admin" decided it, whichever came first with an override
//! }
//! ```

pub mod context;
pub mod error;
pub mod evaluation;
pub mod flag;
pub mod normalize;

pub use context::{ContextInput, EvaluationContext};
pub use error::{GateError, Result, ValidationError};
pub use evaluation::{EvaluationResult, EvaluationSource, FlagEvaluator, FlagLookup, FlagStore};
pub use flag::{FeatureFlag, FeatureOverride, FlagId, OverrideId, OverrideKey, OverrideType};
pub use normalize::{normalize_key, normalize_region, normalize_target};
