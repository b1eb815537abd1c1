//! Consent enforcement and moderation-label visibility rules.
//!
//! Both modules are pure: no locking, no I/O, no repository access. They
//! are called from repository mutation/read paths but own no state
//! themselves.

#![forbid(unsafe_code)]

pub mod consent;
pub mod label;

pub use consent::{LocationConsent, enforce};
pub use label::{Context, Viewer, filter_visible, validate, visible};
