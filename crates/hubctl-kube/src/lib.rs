//! hubctl Kube - everything that talks to a running cluster
//!
//! - [`ReleaseManager`]: installs, lists and removes hubs with `helm`
//! - [`ClusterBootstrap`]: applies the auth and storage manifests with `kubectl`
//! - [`HubInspector`]: reads a hub's public address from the Kubernetes API

pub mod bootstrap;
pub mod error;
pub mod hub;
pub mod release;
pub mod target;

pub use bootstrap::ClusterBootstrap;
pub use error::{KubeError, Result};
pub use hub::HubInspector;
pub use release::{ChartSource, HubSpec, Release, ReleaseManager, generate_token};
pub use target::KubeTarget;
