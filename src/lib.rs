//! Parlance: tiered intent classification with self-diagnosing patterns.
//!
//! Utterances go through a pattern fast path, then structural heuristics,
//! then an optional external model. Failed fast-path attempts can be
//! explained pattern by pattern, and every outcome feeds a consistency
//! monitor that reports when the same input stops resolving the same way.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod types;

pub mod patterns;

pub mod classifier;
pub mod diagnostics;
pub mod health;

pub mod service;

pub use classifier::{ClassificationContext, ClassificationResult, Classifier};
pub use diagnostics::{DiagnosticsEngine, DiagnosticsReport, FailureReason};
pub use health::{HealthMonitor, HealthReport};
pub use patterns::PatternStore;
pub use service::IntentService;
pub use types::{Category, Method, SubCategory};
