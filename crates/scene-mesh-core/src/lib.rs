//! Core types, configuration, and models for scene-mesh.
//!
//! This crate provides:
//! - Configuration management (`Config`, environment parsing)
//! - Data models (`Scene`, `Event`, `Post`, `Membership`, `Alliance`, ...)
//! - The lock-ordering hierarchy shared by the repository, trust, and search layers
//! - Lock-free metrics primitives and the `JobMetricsSink` interface
//! - Common error types

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod lock_order;
pub mod metrics;
pub mod models;

// Re-export key types for convenience
pub use config::{AppEnvironment, Config};
pub use error::{Error, Result};
pub use lock_order::{
    LockContentionEntry, LockLevel, OrderedMutex, OrderedRwLock, lock_contention_reset,
    lock_contention_snapshot,
};
pub use metrics::{
    Counter, FixedBucketHistogram, FixedBucketSnapshot, GaugeI64, GaugeU64, HistogramSnapshot,
    JobMetricsSink, Log2Histogram, RECOMPUTE_DURATION_BUCKETS, RecomputeMetrics,
    global_recompute_metrics,
};
pub use models::{
    Alliance, Event, GeoPoint, Label, Membership, Post, RecordKey, Role, Scene, SceneTrustScore,
    Visibility,
};
