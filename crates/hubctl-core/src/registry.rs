//! Kubeconfig-backed registry of clusters
//!
//! The registry is the local record of which clusters exist and which one is
//! active. It reads and writes a standard kubeconfig file so `kubectl` and
//! `helm` pick up the same contexts.
//!
//! Changes are made on an in-memory copy and only reach the file on
//! [`Registry::commit`], which replaces the file atomically. Dropping a
//! registry without committing leaves the file as it was.
//!
//! Concurrent hubctl processes working on the same file are not coordinated;
//! the last commit wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cluster::AuthExec;
use crate::error::{CoreError, Result};

type Extra = BTreeMap<String, serde_yaml::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    api_version: String,

    #[serde(default = "default_kind")]
    kind: String,

    #[serde(default)]
    clusters: Vec<NamedCluster>,

    #[serde(default)]
    users: Vec<NamedUser>,

    #[serde(default)]
    contexts: Vec<NamedContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_context: Option<String>,

    /// Keys hubctl does not manage (preferences, extensions, ...)
    #[serde(flatten)]
    extra: Extra,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

impl Default for Kubeconfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            users: Vec::new(),
            contexts: Vec::new(),
            current_context: None,
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterInfo {
    #[serde(default)]
    server: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    certificate_authority_data: Option<String>,

    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserInfo {
    /// Kept untyped so fields hubctl does not model survive a rewrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exec: Option<serde_yaml::Value>,

    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContextInfo {
    cluster: String,
    #[serde(default)]
    user: String,

    #[serde(flatten)]
    extra: Extra,
}

/// One cluster/context as seen through the kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub cluster_name: String,
    pub server_url: String,
    pub ca_data: Option<String>,
    pub user_name: String,
    pub auth_exec: Option<AuthExec>,
    pub context_name: String,
    pub is_current: bool,
}

/// In-memory copy of a kubeconfig file, committed atomically
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    config: Kubeconfig,
    dirty: bool,
}

impl Registry {
    /// Open the registry at `path`; a missing file is an empty registry
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Kubeconfig::default()
            } else {
                let mut config: Kubeconfig =
                    serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidKubeconfig {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                // kubectl writes `current-context: ""` when nothing is selected
                if config.current_context.as_deref() == Some("") {
                    config.current_context = None;
                }
                config
            }
        } else {
            Kubeconfig::default()
        };

        Ok(Self {
            path,
            config,
            dirty: false,
        })
    }

    /// First entry of `KUBECONFIG`, else `~/.kube/config`
    pub fn default_path() -> PathBuf {
        if let Some(first) = std::env::var_os("KUBECONFIG")
            .as_ref()
            .and_then(|v| std::env::split_paths(v).next())
            .filter(|p| !p.as_os_str().is_empty())
        {
            return first;
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kube")
            .join("config")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    /// Whether a context or cluster entry with this name exists
    pub fn contains(&self, cluster_name: &str) -> bool {
        self.config.contexts.iter().any(|c| c.name == cluster_name)
            || self.config.clusters.iter().any(|c| c.name == cluster_name)
    }

    /// Add a cluster, its user and a context binding them, as one set
    pub fn add(
        &mut self,
        cluster_name: &str,
        server: &str,
        ca_data: &str,
        user: &str,
        auth_exec: &AuthExec,
    ) -> Result<()> {
        if self.contains(cluster_name) {
            return Err(CoreError::DuplicateCluster {
                name: cluster_name.to_string(),
                path: self.path_string(),
            });
        }
        let exec = serde_yaml::to_value(auth_exec)?;

        self.config.clusters.push(NamedCluster {
            name: cluster_name.to_string(),
            cluster: ClusterInfo {
                server: server.to_string(),
                certificate_authority_data: Some(ca_data.to_string()),
                extra: Extra::new(),
            },
        });

        // A user entry of the same name is replaced, its credentials belong to this cluster
        self.config.users.retain(|u| u.name != user);
        self.config.users.push(NamedUser {
            name: user.to_string(),
            user: UserInfo {
                exec: Some(exec),
                extra: Extra::new(),
            },
        });

        self.config.contexts.push(NamedContext {
            name: cluster_name.to_string(),
            context: ContextInfo {
                cluster: cluster_name.to_string(),
                user: user.to_string(),
                extra: Extra::new(),
            },
        });

        self.dirty = true;
        Ok(())
    }

    /// Register a cluster, replacing an entry that points elsewhere
    ///
    /// Returns whether the registry changed. An entry with the same server
    /// and CA data is kept as is.
    pub fn upsert(
        &mut self,
        cluster_name: &str,
        server: &str,
        ca_data: &str,
        user: &str,
        auth_exec: &AuthExec,
    ) -> Result<bool> {
        if let Some(entry) = self.entry(cluster_name)
            && entry.server_url == server
            && entry.ca_data.as_deref() == Some(ca_data)
        {
            return Ok(false);
        }
        if self.remove(cluster_name) {
            tracing::info!("replacing stale kubeconfig entry for {}", cluster_name);
        }
        self.add(cluster_name, server, ca_data, user, auth_exec)?;
        Ok(true)
    }

    /// Remove a cluster's context, cluster and user entries
    ///
    /// Returns whether anything was removed; an unknown name is not an error.
    pub fn remove(&mut self, cluster_name: &str) -> bool {
        let context = self
            .config
            .contexts
            .iter()
            .position(|c| c.name == cluster_name)
            .map(|idx| self.config.contexts.remove(idx));

        let (cluster_ref, user_ref) = match &context {
            Some(ctx) => (ctx.context.cluster.clone(), Some(ctx.context.user.clone())),
            None => (cluster_name.to_string(), None),
        };

        // Entries still used by another context stay
        let still_used_cluster = self
            .config
            .contexts
            .iter()
            .any(|c| c.context.cluster == cluster_ref);
        let before = self.config.clusters.len();
        if !still_used_cluster {
            self.config.clusters.retain(|c| c.name != cluster_ref);
        }
        let removed_cluster = self.config.clusters.len() != before;

        if let Some(user) = user_ref {
            let still_used_user = self.config.contexts.iter().any(|c| c.context.user == user);
            if !still_used_user {
                self.config.users.retain(|u| u.name != user);
            }
        }

        if self.config.current_context.as_deref() == Some(cluster_name) {
            self.config.current_context = None;
        }

        let removed = context.is_some() || removed_cluster;
        self.dirty |= removed;
        removed
    }

    /// Make a cluster's context the current one
    pub fn set_current(&mut self, cluster_name: &str) -> Result<()> {
        if !self.config.contexts.iter().any(|c| c.name == cluster_name) {
            return Err(CoreError::UnknownCluster {
                name: cluster_name.to_string(),
                path: self.path_string(),
            });
        }
        if self.config.current_context.as_deref() != Some(cluster_name) {
            self.config.current_context = Some(cluster_name.to_string());
            self.dirty = true;
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&str> {
        self.config.current_context.as_deref()
    }

    pub fn entry(&self, cluster_name: &str) -> Option<RegistryEntry> {
        self.config
            .contexts
            .iter()
            .find(|c| c.name == cluster_name)
            .map(|c| self.to_entry(c))
    }

    /// All contexts, in file order
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.config.contexts.iter().map(|c| self.to_entry(c)).collect()
    }

    fn to_entry(&self, ctx: &NamedContext) -> RegistryEntry {
        let cluster = self
            .config
            .clusters
            .iter()
            .find(|c| c.name == ctx.context.cluster);
        let user = self.config.users.iter().find(|u| u.name == ctx.context.user);

        RegistryEntry {
            cluster_name: ctx.context.cluster.clone(),
            server_url: cluster.map(|c| c.cluster.server.clone()).unwrap_or_default(),
            ca_data: cluster.and_then(|c| c.cluster.certificate_authority_data.clone()),
            user_name: ctx.context.user.clone(),
            auth_exec: user
                .and_then(|u| u.user.exec.clone())
                .and_then(|exec| serde_yaml::from_value(exec).ok()),
            context_name: ctx.name.clone(),
            is_current: self.config.current_context.as_deref() == Some(ctx.name.as_str()),
        }
    }

    /// Write pending changes to the file atomically
    ///
    /// Without pending changes the file is not touched.
    pub fn commit(mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let content = serde_yaml::to_string(&self.config)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CoreError::Io(e.error))?;

        self.dirty = false;
        tracing::debug!("committed kubeconfig {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exec(cluster: &str) -> AuthExec {
        AuthExec::new(
            "aws",
            vec!["eks".into(), "get-token".into(), "--cluster-name".into(), cluster.into()],
        )
    }

    const FOREIGN: &str = r#"apiVersion: v1
kind: Config
preferences:
  colors: true
clusters:
- name: kind-dev
  cluster:
    server: https://127.0.0.1:6443
    certificate-authority-data: AAAA
    insecure-skip-tls-verify: false
users:
- name: kind-dev
  user:
    client-certificate-data: BBBB
contexts:
- name: kind-dev
  context:
    cluster: kind-dev
    user: kind-dev
    namespace: default
current-context: kind-dev
"#;

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::open(tmp.path().join("config")).unwrap();
        assert!(registry.entries().is_empty());
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_add_set_current_commit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kube").join("config");

        let mut registry = Registry::open(&path).unwrap();
        registry
            .add("demo", "https://x", "Y", "demo", &exec("demo-cluster"))
            .unwrap();
        registry.set_current("demo").unwrap();
        registry.commit().unwrap();

        let reopened = Registry::open(&path).unwrap();
        let entry = reopened.entry("demo").unwrap();
        assert_eq!(entry.server_url, "https://x");
        assert_eq!(entry.ca_data.as_deref(), Some("Y"));
        assert_eq!(entry.user_name, "demo");
        assert!(entry.is_current);
        assert_eq!(
            entry.auth_exec.unwrap().command_line(),
            "aws eks get-token --cluster-name demo-cluster"
        );
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::open(tmp.path().join("config")).unwrap();
        registry.add("demo", "https://x", "Y", "demo", &exec("demo")).unwrap();

        let err = registry
            .add("demo", "https://z", "Y", "demo", &exec("demo"))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateCluster { .. }));
    }

    #[test]
    fn test_upsert_replaces_stale_endpoint() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        std::fs::write(&path, FOREIGN).unwrap();

        let mut registry = Registry::open(&path).unwrap();
        registry.add("demo", "https://old", "OLD", "demo", &exec("demo")).unwrap();
        registry.set_current("demo").unwrap();
        registry.commit().unwrap();

        let mut registry = Registry::open(&path).unwrap();
        assert!(registry
            .upsert("demo", "https://new", "NEW", "demo", &exec("demo"))
            .unwrap());
        registry.set_current("demo").unwrap();
        registry.commit().unwrap();

        let reopened = Registry::open(&path).unwrap();
        let entry = reopened.entry("demo").unwrap();
        assert_eq!(entry.server_url, "https://new");
        assert_eq!(entry.ca_data.as_deref(), Some("NEW"));
        assert!(entry.is_current);
        assert_eq!(reopened.entries().len(), 2);
        assert!(reopened.entry("kind-dev").is_some());
    }

    #[test]
    fn test_upsert_keeps_matching_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");

        let mut registry = Registry::open(&path).unwrap();
        registry.add("demo", "https://x", "Y", "demo", &exec("demo")).unwrap();
        registry.commit().unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut registry = Registry::open(&path).unwrap();
        assert!(!registry.upsert("demo", "https://x", "Y", "demo", &exec("demo")).unwrap());
        registry.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_set_current_unknown() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::open(tmp.path().join("config")).unwrap();
        assert!(matches!(
            registry.set_current("nope"),
            Err(CoreError::UnknownCluster { .. })
        ));
    }

    #[test]
    fn test_remove_unknown_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        std::fs::write(&path, FOREIGN).unwrap();

        let mut registry = Registry::open(&path).unwrap();
        assert!(!registry.remove("never-added"));
        registry.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), FOREIGN);
    }

    #[test]
    fn test_remove_clears_current_and_keeps_foreign_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        std::fs::write(&path, FOREIGN).unwrap();

        let mut registry = Registry::open(&path).unwrap();
        registry.add("demo", "https://x", "Y", "demo", &exec("demo")).unwrap();
        registry.set_current("demo").unwrap();
        registry.commit().unwrap();

        let mut registry = Registry::open(&path).unwrap();
        assert!(registry.remove("demo"));
        assert!(registry.current().is_none());
        registry.commit().unwrap();

        let reopened = Registry::open(&path).unwrap();
        let names: Vec<_> = reopened.entries().into_iter().map(|e| e.context_name).collect();
        assert_eq!(names, vec!["kind-dev"]);

        // Unmanaged keys survive a rewrite
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("insecure-skip-tls-verify"));
        assert!(content.contains("client-certificate-data"));
        assert!(content.contains("namespace: default"));
        assert!(content.contains("colors: true"));
    }

    #[test]
    fn test_uncommitted_changes_are_discarded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        std::fs::write(&path, FOREIGN).unwrap();

        {
            let mut registry = Registry::open(&path).unwrap();
            registry.add("demo", "https://x", "Y", "demo", &exec("demo")).unwrap();
            registry.set_current("demo").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), FOREIGN);
    }

    #[test]
    fn test_at_most_one_current() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::open(tmp.path().join("config")).unwrap();
        registry.add("a", "https://a", "A", "a", &exec("a")).unwrap();
        registry.add("b", "https://b", "B", "b", &exec("b")).unwrap();
        registry.set_current("a").unwrap();
        registry.set_current("b").unwrap();

        let current: Vec<_> = registry
            .entries()
            .into_iter()
            .filter(|e| e.is_current)
            .map(|e| e.context_name)
            .collect();
        assert_eq!(current, vec!["b"]);
    }
}
