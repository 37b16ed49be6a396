//! CLI error type with exit code handling
//!
//! Every library error is folded into a [`CliError`] at the command boundary,
//! so `main` has a single place that renders diagnostics and picks the exit code.

use hubctl_cloud::CloudError;
use hubctl_core::CoreError;
use hubctl_engine::EngineError;
use hubctl_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Settings file or kubeconfig could not be used
    #[error("Configuration error: {message}")]
    #[diagnostic(code(hubctl::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A template failed to render
    #[error("Template error: {message}")]
    #[diagnostic(code(hubctl::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster provisioning stopped part way
    #[error("Provisioning failed: {message}")]
    #[diagnostic(code(hubctl::cli::provision))]
    Provision {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// helm or kubectl failed
    #[error("Release error: {message}")]
    #[diagnostic(code(hubctl::cli::release))]
    Release {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The named cluster or hub does not exist
    #[error("{message}")]
    #[diagnostic(code(hubctl::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, missing tool)
    #[error("IO error: {message}")]
    #[diagnostic(code(hubctl::cli::io))]
    Io {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(hubctl::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Provision { .. } => exit_codes::PROVISION_ERROR,
            CliError::Release { .. } => exit_codes::RELEASE_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn not_found(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::UnknownCluster { .. } => CliError::NotFound {
                message,
                help: Some("Run `hubctl get cluster` to list known clusters".to_string()),
            },
            CoreError::DuplicateCluster { name, .. } => CliError::Config {
                message,
                help: Some(format!(
                    "Remove the stale entry with `kubectl config delete-context {}`",
                    name
                )),
            },
            CoreError::InvalidKubeconfig { .. } => CliError::Config {
                message,
                help: None,
            },
            CoreError::CommandSpawn { ref program, .. } => CliError::Io {
                help: Some(format!("Make sure `{}` is installed and on PATH", program)),
                message,
            },
            CoreError::Io(_) => CliError::Io {
                message,
                help: None,
            },
            CoreError::YamlParse(_) | CoreError::JsonParse(_) | CoreError::ValuesMerge { .. } => {
                CliError::Config {
                    message,
                    help: None,
                }
            }
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        CliError::Template {
            message: err.to_string(),
            help: None,
        }
    }
}

impl From<CloudError> for CliError {
    fn from(err: CloudError) -> Self {
        let message = err.to_string();
        match err {
            CloudError::Core(core) => core.into(),
            CloudError::Template(engine) => engine.into(),
            CloudError::NotFound { name } => CliError::not_found(
                format!("cluster '{}' does not exist", name),
                format!("Create it with `hubctl create cluster {}`", name),
            ),
            CloudError::UnknownProvider { .. } => CliError::config(message),
            CloudError::StepFailed { .. } => CliError::Provision {
                message,
                help: Some(
                    "Fix the cause and re-run; completed steps are kept and skipped".to_string(),
                ),
            },
            CloudError::Timeout { .. } => CliError::Provision {
                message,
                help: Some(
                    "The stack may still finish; re-run the same command to resume".to_string(),
                ),
            },
            CloudError::TeardownIncomplete { .. } => CliError::Provision {
                message,
                help: Some("Re-run the delete to retry the remaining stacks".to_string()),
            },
            _ => CliError::Provision {
                message,
                help: None,
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Core(core) => core.into(),
            KubeError::Config(_) => CliError::config(message),
            _ => CliError::Release {
                message,
                help: None,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
            help: None,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
