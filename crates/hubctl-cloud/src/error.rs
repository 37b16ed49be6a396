//! Error types for hubctl-cloud

use hubctl_core::{CoreError, StackStatus};
use hubctl_engine::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Result type for hubctl-cloud operations
pub type Result<T> = std::result::Result<T, CloudError>;

/// Errors raised while provisioning or tearing down a cluster
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CloudError {
    /// The provider rejected or failed a call
    #[error("provider error for '{resource}': {message}")]
    Provider { resource: String, message: String },

    /// Stack or managed resource does not exist
    #[error("'{name}' does not exist")]
    NotFound { name: String },

    /// A stack of that name is already creating or complete
    #[error("stack '{name}' already exists")]
    AlreadyExists { name: String },

    /// A step could not produce its outputs
    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// A blocking wait ran past its deadline
    #[error("timed out after {}s waiting for '{stack}' (last status {status})", waited.as_secs())]
    Timeout {
        stack: String,
        waited: Duration,
        status: StackStatus,
    },

    /// Steps are not in dependency order, or produce a result twice
    #[error("invalid pipeline: {message}")]
    InvalidPipeline { message: String },

    /// A step tried to overwrite a result produced earlier in the run
    #[error("result '{key}' is already '{existing}', refusing to replace it with '{value}'")]
    ConflictingResult {
        key: String,
        existing: String,
        value: String,
    },

    /// Some stacks could not be deleted
    #[error("teardown of '{cluster}' incomplete, failed steps: {}", steps.join(", "))]
    TeardownIncomplete { cluster: String, steps: Vec<String> },

    /// Unknown provider name
    #[error("unknown provider '{name}' (available: {available})")]
    UnknownProvider { name: String, available: String },

    /// Provider reply could not be understood
    #[error("unexpected provider response for '{resource}': {message}")]
    Response { resource: String, message: String },

    #[error(transparent)]
    Template(#[from] EngineError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
