//! Which cluster `helm` and `kubectl` talk to

use hubctl_core::Invocation;
use std::path::PathBuf;

/// Kubeconfig file and context passed to every cluster tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KubeTarget {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

impl KubeTarget {
    pub fn new(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            kubeconfig,
            context,
        }
    }

    /// Add `--kubeconfig` and `--<context_flag>` to an invocation
    ///
    /// helm names the context flag `kube-context`, kubectl `context`.
    pub(crate) fn apply(&self, mut invocation: Invocation, context_flag: &str) -> Invocation {
        if let Some(path) = &self.kubeconfig {
            invocation = invocation.flag("kubeconfig", path.display().to_string());
        }
        if let Some(context) = &self.context {
            invocation = invocation.flag(context_flag, context.as_str());
        }
        invocation
    }
}
