//! User settings
//!
//! Read from `$XDG_CONFIG_HOME/hubctl/config.yaml` unless `--config` points
//! elsewhere. Every key is optional:
//!
//! ```yaml
//! provider: eks
//! region: us-west-2
//! stackTimeout: 45m
//! pollInterval: 20s
//! adminGroup: jupyter-admins
//! nodes:
//!   instanceType: m5.xlarge
//!   desiredSize: 2
//!   maxSize: 4
//! hub:
//!   version: 3.3.8
//! ```
//!
//! Flags and `HUBCTL_*` environment variables override the file.

use hubctl_cloud::{EksOptions, NetworkOptions, NodeOptions, ProviderKind, WaitPolicy};
use hubctl_kube::ChartSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub provider: ProviderKind,
    pub region: Option<String>,
    /// Kubeconfig used as the cluster registry
    pub kubeconfig: Option<PathBuf>,
    /// Directory whose templates shadow the built-in ones
    pub template_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub stack_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub admin_group: String,
    pub network: NetworkOptions,
    pub nodes: NodeOptions,
    pub hub: HubSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let policy = WaitPolicy::default();
        Self {
            provider: ProviderKind::default(),
            region: None,
            kubeconfig: None,
            template_dir: None,
            stack_timeout: policy.timeout,
            poll_interval: policy.poll_interval,
            admin_group: EksOptions::default().admin_group,
            network: NetworkOptions::default(),
            nodes: NodeOptions::default(),
            hub: HubSettings::default(),
        }
    }
}

/// Chart used for hubs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    pub chart: String,
    pub repo_name: String,
    pub repo_url: String,
    pub version: String,
}

impl Default for HubSettings {
    fn default() -> Self {
        let source = ChartSource::default();
        Self {
            chart: source.chart,
            repo_name: source.repo_name,
            repo_url: source.repo_url,
            version: source.version,
        }
    }
}

impl HubSettings {
    pub fn chart_source(&self) -> ChartSource {
        ChartSource {
            repo_name: self.repo_name.clone(),
            repo_url: self.repo_url.clone(),
            chart: self.chart.clone(),
            version: self.version.clone(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location if it exists
    ///
    /// An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            help: None,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| CliError::Config {
            message: format!("invalid settings in {}: {}", path.display(), e),
            help: Some("Keys are camelCase, durations look like `30m` or `15s`".to_string()),
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hubctl").join("config.yaml"))
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.stack_timeout, self.poll_interval)
    }

    pub fn eks_options(&self) -> EksOptions {
        EksOptions {
            region: self.region.clone(),
            admin_group: self.admin_group.clone(),
            network: self.network.clone(),
            nodes: self.nodes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider, ProviderKind::Eks);
        assert_eq!(settings.stack_timeout, Duration::from_secs(30 * 60));
        assert_eq!(settings.poll_interval, Duration::from_secs(15));
        assert_eq!(settings.admin_group, "admin");
        assert_eq!(settings.hub.chart_source(), ChartSource::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "region: eu-west-1\nstackTimeout: 45m\nnodes:\n  instanceType: m5.xlarge\n  maxSize: 4\nhub:\n  version: 4.0.0\n"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.stack_timeout, Duration::from_secs(45 * 60));
        assert_eq!(settings.poll_interval, Duration::from_secs(15));
        assert_eq!(settings.nodes.instance_type, "m5.xlarge");
        assert_eq!(settings.nodes.max_size, 4);
        assert_eq!(settings.nodes.desired_size, 1);
        assert_eq!(settings.hub.version, "4.0.0");
        assert_eq!(settings.hub.repo_name, "jupyterhub");

        let options = settings.eks_options();
        assert_eq!(options.region.as_deref(), Some("eu-west-1"));
        assert_eq!(options.nodes.instance_type, "m5.xlarge");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(Settings::load(Some(file.path())).unwrap(), Settings::default());
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_bad_duration_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pollInterval: soon").unwrap();
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("invalid settings"));
    }
}
