//! First-time setup of a freshly provisioned cluster

use hubctl_core::{CommandRunner, Invocation, Tool};
use std::sync::Arc;

use crate::error::{KubeError, Result};
use crate::target::KubeTarget;

/// Storage class EKS installs as the default, replaced by our own classes
const STOCK_STORAGE_CLASS: &str = "gp2";

/// Applies cluster-level manifests with `kubectl`
#[derive(Debug, Clone)]
pub struct ClusterBootstrap {
    kubectl: Tool,
    target: KubeTarget,
}

impl ClusterBootstrap {
    pub fn new(runner: Arc<dyn CommandRunner>, target: KubeTarget) -> Self {
        Self {
            kubectl: Tool::new("kubectl", runner),
            target,
        }
    }

    async fn kubectl(&self, action: &str, invocation: Invocation) -> Result<String> {
        let output = self
            .kubectl
            .run(self.target.apply(invocation, "context"))
            .await?;
        if !output.success() {
            return Err(KubeError::Kubectl {
                action: action.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// `kubectl apply` a manifest passed on stdin
    pub async fn apply(&self, manifest: &str) -> Result<()> {
        self.kubectl("apply", Invocation::new(["apply", "-f", "-"]).stdin(manifest))
            .await?;
        Ok(())
    }

    /// Map nodes and admins into the cluster and install the storage classes
    pub async fn bootstrap(&self, auth_config: &str, storage_config: &str) -> Result<()> {
        tracing::info!("applying node and administrator mappings");
        self.apply(auth_config).await?;

        // The stock class is marked default and would compete with ours
        self.kubectl(
            "delete storageclass",
            Invocation::new(["delete", "storageclass", STOCK_STORAGE_CLASS])
                .arg("--ignore-not-found"),
        )
        .await?;

        tracing::info!("installing storage classes");
        self.apply(storage_config).await
    }
}
