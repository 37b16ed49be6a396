//! The externally visible result of provisioning

use serde::{Deserialize, Serialize};

/// A provisioned Kubernetes cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Logical cluster name given by the user
    pub name: String,

    /// Name of the managed control plane at the provider
    pub control_plane_name: String,

    /// API server endpoint
    pub endpoint_url: String,

    /// Base64 encoded CA bundle of the API server
    pub ca_cert: String,

    /// Kubeconfig context bound to this cluster
    pub context_name: String,

    /// Security group attached to worker nodes
    pub worker_security_group: String,

    /// Shared filesystem mounted by hubs
    pub filesystem_id: String,
}

/// Command a kube client runs to mint short-lived credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthExec {
    pub api_version: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AuthExec {
    pub const API_VERSION: &'static str = "client.authentication.k8s.io/v1beta1";

    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            command: command.into(),
            args,
        }
    }

    /// Rendered as a shell-like command line, for display
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
