//! Cluster providers
//!
//! A provider binds one cluster name to a provisioning pipeline and knows how
//! clients authenticate against the result. Providers are a closed set,
//! listed in [`ProviderKind::ALL`].

mod eks;

pub use eks::{EksOptions, EksProvider, NetworkOptions, NodeOptions, eks_steps};

use async_trait::async_trait;
use hubctl_core::{AuthExec, Cluster, StackStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CloudError, Result};
use crate::pipeline::{Backends, TeardownReport};
use crate::progress::ProgressObserver;

/// Everything hubctl needs from a managed Kubernetes offering
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Logical cluster name this provider is bound to
    fn cluster_name(&self) -> &str;

    /// Provision (or resume provisioning) the cluster
    async fn create_cluster(&self, observer: &mut dyn ProgressObserver) -> Result<Cluster>;

    /// Delete every stack of the cluster, best effort
    async fn teardown_cluster(&self, observer: &mut dyn ProgressObserver) -> TeardownReport;

    /// The cluster if it is fully provisioned
    async fn describe_cluster(&self) -> Result<Option<Cluster>>;

    /// Stack status per provisioning step
    async fn status(&self) -> Result<Vec<(String, StackStatus)>>;

    /// Command kube clients run to obtain short-lived credentials
    fn auth_exec(&self) -> AuthExec;

    /// Manifest mapping worker nodes and administrators into the cluster
    async fn auth_config(&self) -> Result<String>;

    /// Manifest installing the cluster's storage classes
    async fn storage_config(&self) -> Result<String>;
}

/// Supported providers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// AWS Elastic Kubernetes Service, provisioned with CloudFormation
    #[default]
    Eks,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[ProviderKind::Eks];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Eks => "eks",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CloudError::UnknownProvider {
                name: name.to_string(),
                available: Self::ALL
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Bind `cluster` to a provider of this kind
    pub fn bind(
        self,
        cluster: &str,
        backends: Backends,
        options: &EksOptions,
    ) -> Result<Box<dyn ClusterProvider>> {
        match self {
            ProviderKind::Eks => Ok(Box::new(EksProvider::new(
                cluster,
                backends,
                options.clone(),
            )?)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
