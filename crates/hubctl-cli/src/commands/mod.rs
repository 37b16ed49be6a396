//! CLI commands

pub mod cluster;
pub mod hub;
pub mod render;
pub mod use_context;

use hubctl_cloud::{AwsCli, Backends, ClusterProvider};
use hubctl_core::{CommandRunner, ProcessRunner, Registry};
use hubctl_engine::Renderer;
use hubctl_kube::{ClusterBootstrap, KubeTarget, ReleaseManager};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{CliError, Result};

/// Settings and collaborators shared by every command
pub struct Context {
    pub settings: Settings,
    /// Kubeconfig acting as the cluster registry
    pub kubeconfig: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        let kubeconfig = settings
            .kubeconfig
            .clone()
            .unwrap_or_else(Registry::default_path);
        Self {
            settings,
            kubeconfig,
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn registry(&self) -> Result<Registry> {
        Ok(Registry::open(&self.kubeconfig)?)
    }

    pub fn renderer(&self) -> Renderer {
        match &self.settings.template_dir {
            Some(dir) => Renderer::builder().override_dir(dir).build(),
            None => Renderer::embedded(),
        }
    }

    /// Provider bound to `cluster`, talking to AWS through the `aws` CLI
    pub fn provider(&self, cluster: &str) -> Result<Box<dyn ClusterProvider>> {
        let aws = AwsCli::new(self.runner.clone(), self.settings.region.clone());
        let backends = Backends::aws(aws, self.settings.wait_policy(), Arc::new(self.renderer()));
        Ok(self
            .settings
            .provider
            .bind(cluster, backends, &self.settings.eks_options())?)
    }

    /// Kube context of a registered cluster, the current one if none is named
    pub fn kube_context(&self, cluster: Option<&str>) -> Result<String> {
        let registry = self.registry()?;
        let name = match cluster {
            Some(name) => name.to_string(),
            None => registry.current().map(String::from).ok_or_else(|| {
                CliError::not_found(
                    "no cluster selected",
                    "Pass --cluster or select one with `hubctl use <cluster>`",
                )
            })?,
        };
        registry
            .entry(&name)
            .map(|entry| entry.context_name)
            .ok_or_else(|| {
                CliError::not_found(
                    format!("cluster '{}' is not registered in {}", name, self.kubeconfig.display()),
                    "Run `hubctl get cluster` to list known clusters",
                )
            })
    }

    pub fn target(&self, context: String) -> KubeTarget {
        KubeTarget::new(Some(self.kubeconfig.clone()), Some(context))
    }

    pub fn releases(&self, target: KubeTarget) -> ReleaseManager {
        ReleaseManager::new(self.runner.clone(), target, self.settings.hub.chart_source())
    }

    pub fn bootstrap(&self, target: KubeTarget) -> ClusterBootstrap {
        ClusterBootstrap::new(self.runner.clone(), target)
    }
}
