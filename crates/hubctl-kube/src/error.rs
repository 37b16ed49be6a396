//! Error types for hubctl-kube

use hubctl_core::CoreError;
use thiserror::Error;

/// Result type for hubctl-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while managing hubs
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// `helm` exited non-zero
    #[error("helm {action} failed for release '{release}': {stderr}")]
    Release {
        action: String,
        release: String,
        stderr: String,
    },

    /// `kubectl` exited non-zero
    #[error("kubectl {action} failed: {stderr}")]
    Kubectl { action: String, stderr: String },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be turned into a client
    #[error("invalid kube configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
