//! Hub commands - install, list, describe and remove JupyterHub releases

use console::style;
use hubctl_core::{Values, parse_set_values};
use hubctl_kube::{HubInspector, HubSpec};
use std::path::PathBuf;

use super::Context;
use crate::error::Result;

/// Options of `create hub`
#[derive(Debug, Default)]
pub struct CreateOptions {
    pub cluster: Option<String>,
    pub values: Vec<PathBuf>,
    pub set: Vec<String>,
    pub version: Option<String>,
    pub release: Option<String>,
}

/// Install or upgrade a hub in namespace `name`
pub async fn create(ctx: &Context, name: &str, options: CreateOptions) -> Result<()> {
    let context = ctx.kube_context(options.cluster.as_deref())?;

    let mut file_values = Values::new();
    for path in &options.values {
        file_values.merge(&Values::from_file(path)?);
    }

    let spec = HubSpec {
        namespace: name.to_string(),
        release: options.release,
        version: options.version,
        file_values,
        set_values: parse_set_values(&options.set)?,
    };

    println!(
        "{} Installing hub {} on {}",
        style("→").blue().bold(),
        style(spec.release_name()).cyan(),
        style(&context).yellow()
    );

    let release = ctx.releases(ctx.target(context)).create(&spec).await?;

    println!(
        "{} Installed {} {} in namespace {}",
        style("✓").green().bold(),
        style(&release.chart).cyan(),
        style(&release.version).yellow(),
        style(&release.namespace).cyan()
    );
    println!("  A new proxy secret token was generated");
    Ok(())
}

/// List hubs with their public address, or show one hub
pub async fn get(ctx: &Context, name: Option<&str>, cluster: Option<&str>) -> Result<()> {
    let context = ctx.kube_context(cluster)?;
    let target = ctx.target(context);

    let hubs = match name {
        Some(name) => vec![name.to_string()],
        None => ctx.releases(target.clone()).list().await?,
    };
    if hubs.is_empty() {
        println!("No hubs deployed");
        return Ok(());
    }

    let inspector = HubInspector::connect(&target).await?;
    println!("{}", style("Hubs:").bold());
    for hub in hubs {
        let url = match inspector.public_address(&hub).await {
            Ok(Some(address)) => style(format!("http://{}", address)).green(),
            Ok(None) => style("<pending>".to_string()).yellow(),
            Err(e) => {
                tracing::warn!("could not read the address of hub {}: {}", hub, e);
                style("<unknown>".to_string()).dim()
            }
        };
        println!("  - Name: {}", style(&hub).cyan());
        println!("    Url:  {}", url);
    }
    Ok(())
}

/// Remove a hub and its namespace
pub async fn delete(ctx: &Context, name: &str, cluster: Option<&str>) -> Result<()> {
    let context = ctx.kube_context(cluster)?;
    println!(
        "{} Deleting hub {} from {}",
        style("→").blue().bold(),
        style(name).cyan(),
        style(&context).yellow()
    );

    ctx.releases(ctx.target(context)).delete(name, name).await?;

    println!("{} Deleted hub {}", style("✓").green().bold(), style(name).cyan());
    Ok(())
}

/// Print `helm status` of a hub
pub async fn describe(ctx: &Context, name: &str, cluster: Option<&str>) -> Result<()> {
    let context = ctx.kube_context(cluster)?;
    let status = ctx.releases(ctx.target(context)).status(name, name).await?;
    print!("{}", status);
    Ok(())
}
