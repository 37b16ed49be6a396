//! Hub releases managed with `helm`
//!
//! A hub is one helm release of the JupyterHub chart in its own namespace.
//! Its values are layered lowest precedence first:
//! 1. the values file given with `-f`
//! 2. `--set` overrides
//! 3. a freshly generated `proxy.secretToken`, which users cannot override
//!
//! Every `create` generates a new token, so re-running it rotates the secret.

use hubctl_core::{CommandRunner, Invocation, Tool, Values};
use rand::Rng;
use std::sync::Arc;

use crate::error::{KubeError, Result};
use crate::target::KubeTarget;

/// Values key holding the proxy's shared secret
pub const SECRET_TOKEN_KEY: &str = "proxy.secretToken";

/// Where the hub chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSource {
    pub repo_name: String,
    pub repo_url: String,
    pub chart: String,
    /// Chart version used when a hub does not ask for one
    pub version: String,
}

impl ChartSource {
    /// `<repo>/<chart>` as helm expects it
    pub fn reference(&self) -> String {
        format!("{}/{}", self.repo_name, self.chart)
    }
}

impl Default for ChartSource {
    fn default() -> Self {
        Self {
            repo_name: "jupyterhub".to_string(),
            repo_url: "https://jupyterhub.github.io/helm-chart/".to_string(),
            chart: "jupyterhub".to_string(),
            version: "3.3.8".to_string(),
        }
    }
}

/// What to install
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubSpec {
    pub namespace: String,
    /// Release name, defaults to the namespace
    pub release: Option<String>,
    /// Chart version, defaults to the chart source's version
    pub version: Option<String>,
    pub file_values: Values,
    pub set_values: Values,
}

impl HubSpec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn release_name(&self) -> &str {
        self.release.as_deref().unwrap_or(&self.namespace)
    }
}

/// An installed hub
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub version: String,
    /// Values passed to helm, token included
    pub values: Values,
}

impl Release {
    pub fn security_token(&self) -> Option<&str> {
        self.values.get(SECRET_TOKEN_KEY).and_then(|v| v.as_str())
    }
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

/// Installs and removes hubs
#[derive(Debug, Clone)]
pub struct ReleaseManager {
    helm: Tool,
    kubectl: Tool,
    target: KubeTarget,
    chart: ChartSource,
}

impl ReleaseManager {
    pub fn new(runner: Arc<dyn CommandRunner>, target: KubeTarget, chart: ChartSource) -> Self {
        Self {
            helm: Tool::new("helm", runner.clone()),
            kubectl: Tool::new("kubectl", runner),
            target,
            chart,
        }
    }

    pub fn chart(&self) -> &ChartSource {
        &self.chart
    }

    async fn helm(&self, invocation: Invocation) -> Result<hubctl_core::CommandOutput> {
        Ok(self
            .helm
            .run(self.target.apply(invocation, "kube-context"))
            .await?)
    }

    /// Values for a new release with a fresh token on top
    pub fn release_values(spec: &HubSpec, token: &str) -> Result<Values> {
        let mut security = Values::new();
        security.set(SECRET_TOKEN_KEY, serde_json::Value::String(token.to_string()))?;
        Ok(Values::layered([
            spec.file_values.clone(),
            spec.set_values.clone(),
            security,
        ]))
    }

    /// Install or upgrade a hub
    pub async fn create(&self, spec: &HubSpec) -> Result<Release> {
        let release = spec.release_name().to_string();
        let version = spec
            .version
            .clone()
            .unwrap_or_else(|| self.chart.version.clone());
        let values = Self::release_values(spec, &generate_token())?;

        self.add_repository(&release).await?;

        tracing::info!(
            "installing {} {} as {} in namespace {}",
            self.chart.reference(),
            version,
            release,
            spec.namespace
        );
        let output = self
            .helm(
                Invocation::new(["upgrade", "--install", release.as_str()])
                    .arg(self.chart.reference())
                    .arg("--create-namespace")
                    .flag("namespace", spec.namespace.as_str())
                    .flag("version", version.as_str())
                    .flag("values", "-")
                    .stdin(values.to_yaml()?),
            )
            .await?;
        if !output.success() {
            return Err(KubeError::Release {
                action: "upgrade --install".to_string(),
                release,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(Release {
            name: release,
            namespace: spec.namespace.clone(),
            chart: self.chart.reference(),
            version,
            values,
        })
    }

    async fn add_repository(&self, release: &str) -> Result<()> {
        let added = self
            .helm(Invocation::new([
                "repo",
                "add",
                self.chart.repo_name.as_str(),
                self.chart.repo_url.as_str(),
            ]))
            .await?;
        if !added.success() && !added.stderr.contains("already exists") {
            return Err(KubeError::Release {
                action: "repo add".to_string(),
                release: release.to_string(),
                stderr: added.stderr.trim().to_string(),
            });
        }

        let updated = self.helm(Invocation::new(["repo", "update"])).await?;
        if !updated.success() {
            return Err(KubeError::Release {
                action: "repo update".to_string(),
                release: release.to_string(),
                stderr: updated.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Remove a hub and its namespace; already-removed hubs are fine
    pub async fn delete(&self, release: &str, namespace: &str) -> Result<()> {
        let uninstalled = self
            .helm(Invocation::new(["uninstall", release]).flag("namespace", namespace))
            .await?;
        if !uninstalled.success() {
            if !is_not_found(&uninstalled.stderr) {
                return Err(KubeError::Release {
                    action: "uninstall".to_string(),
                    release: release.to_string(),
                    stderr: uninstalled.stderr.trim().to_string(),
                });
            }
            tracing::info!("release {} was already uninstalled", release);
        }

        let deleted = self
            .kubectl
            .run(
                self.target
                    .apply(Invocation::new(["delete", "namespace", namespace]), "context"),
            )
            .await?;
        if !deleted.success() && !is_not_found(&deleted.stderr) {
            return Err(KubeError::Kubectl {
                action: format!("delete namespace {}", namespace),
                stderr: deleted.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Names of all releases in the cluster
    pub async fn list(&self) -> Result<Vec<String>> {
        let output = self
            .helm(Invocation::new(["list", "--all-namespaces", "--short"]))
            .await?;
        if !output.success() {
            return Err(KubeError::Release {
                action: "list".to_string(),
                release: "*".to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// `helm status` of a release
    pub async fn status(&self, release: &str, namespace: &str) -> Result<String> {
        let output = self
            .helm(Invocation::new(["status", release]).flag("namespace", namespace))
            .await?;
        if !output.success() {
            return Err(KubeError::Release {
                action: "status".to_string(),
                release: release.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("not found") || stderr.contains("notfound")
}
