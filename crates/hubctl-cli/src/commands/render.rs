//! Render command - print the manifests applied to a provisioned cluster

use clap::ValueEnum;

use super::Context;
use crate::error::Result;

/// Cluster manifests that can be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Manifest {
    /// aws-auth ConfigMap mapping worker nodes and admins
    AuthConfig,
    /// Storage classes backed by the cluster filesystem
    StorageConfig,
}

pub async fn run(ctx: &Context, manifest: Manifest, cluster: &str) -> Result<()> {
    let provider = ctx.provider(cluster)?;
    let rendered = match manifest {
        Manifest::AuthConfig => provider.auth_config().await?,
        Manifest::StorageConfig => provider.storage_config().await?,
    };
    print!("{}", rendered);
    Ok(())
}
