//! Error types for scene-mesh.
//!
//! The variant set maps 1:1 to the error kinds named in the component spec
//! (`NotFound`, `Deleted`, `InvalidLabel`, ...); repositories and the
//! recompute engine never invent new kinds ad hoc.

use thiserror::Error;

/// Result type alias for scene-mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scene-mesh.
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Resource Not Found Errors
    // ==========================================================================
    #[error("post not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("scene not found: {0}")]
    SceneNotFound(uuid::Uuid),

    #[error("event not found: {0}")]
    EventNotFound(uuid::Uuid),

    // ==========================================================================
    // Terminal-state errors
    // ==========================================================================
    #[error("record is soft-deleted: {0}")]
    Deleted(uuid::Uuid),

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid trust weight: {0} (must be in [0, 1])")]
    InvalidTrustWeight(f64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ==========================================================================
    // Recompute Engine Errors
    // ==========================================================================
    #[error("recompute cycle exceeded its deadline")]
    CycleTimeout,

    #[error("data source error: {0}")]
    DataSourceError(String),

    #[error("score store error: {0}")]
    StoreError(String),

    // ==========================================================================
    // Serialization / internal
    // ==========================================================================
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error kind string, stable across releases (used by
    /// collaborators that translate this core's errors into their own
    /// wire-level error payloads).
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::SceneNotFound(_) | Self::EventNotFound(_) => "NOT_FOUND",
            Self::Deleted(_) => "DELETED",
            Self::InvalidLabel(_) => "INVALID_LABEL",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::InvalidTrustWeight(_) => "INVALID_TRUST_WEIGHT",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::CycleTimeout => "CYCLE_TIMEOUT",
            Self::DataSourceError(_) => "DATA_SOURCE_ERROR",
            Self::StoreError(_) => "STORE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may usefully retry the operation that produced this
    /// error. `NotFound`/`Deleted`/validation errors are not recoverable by
    /// retrying unchanged input; infrastructure errors are.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataSourceError(_) | Self::StoreError(_) | Self::CycleTimeout
        )
    }
}
