//! Error types for Atelier.

use std::path::PathBuf;

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request validation errors. A spec that fails validation is rejected
/// before a job is ever created.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Invalid {field}: {value} (allowed: {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid guidance scale: {value} (allowed: 0.0..=20.0)")]
    GuidanceOutOfRange { value: f32 },
}

/// Job-tracking errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: Uuid },
}

/// Compute-engine failures. Captured into the job's failed state,
/// never escaping to crash the registry.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Render(String),

    #[error("Failed to encode artifact: {0}")]
    Encode(String),
}

/// History log and artifact file errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Result {id} not found")]
    NotFound { id: Uuid },

    #[error("Artifact file missing for result {id}: {path}")]
    ArtifactMissing { id: Uuid, path: PathBuf },

    #[error("Failed to read history log {path}: {message}")]
    LogRead { path: PathBuf, message: String },

    #[error("Failed to write history log {path}: {message}")]
    LogWrite { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
