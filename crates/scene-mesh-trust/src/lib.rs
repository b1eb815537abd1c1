//! Trust-score computation, dirty-set tracking, and the background
//! recompute engine that ties them together.

#![forbid(unsafe_code)]

pub mod data_source;
pub mod dirty_set;
pub mod recompute_engine;
pub mod trust_model;

pub use data_source::{DataSource, InMemoryDataSource, InMemoryScoreStore, ScoreStore};
pub use dirty_set::DirtySet;
pub use recompute_engine::{CycleReport, RecomputeEngine};
pub use trust_model::{role_mult, score};
