//! Cluster commands - provision, list and tear down clusters

use console::style;
use hubctl_core::{Registry, RegistryEntry, StackStatus};

use super::Context;
use crate::error::Result;
use crate::progress::StepProgress;

/// Provision a cluster, register it and prepare it for hubs
///
/// Safe to re-run after a failure: finished stacks are skipped.
pub async fn create(ctx: &Context, name: &str) -> Result<()> {
    println!(
        "{} Creating {} cluster {}",
        style("→").blue().bold(),
        style(ctx.settings.provider).yellow(),
        style(name).cyan()
    );

    let provider = ctx.provider(name)?;
    let mut progress = StepProgress::new("provisioning");
    let cluster = provider.create_cluster(&mut progress).await?;

    let mut registry = ctx.registry()?;
    let changed = registry.upsert(
        &cluster.name,
        &cluster.endpoint_url,
        &cluster.ca_cert,
        &cluster.name,
        &provider.auth_exec(),
    )?;
    if !changed {
        tracing::info!("cluster {} already registered in {}", cluster.name, registry.path().display());
    }
    registry.set_current(&cluster.context_name)?;
    registry.commit()?;
    println!(
        "{} Registered context {} in {}",
        style("✓").green().bold(),
        style(&cluster.context_name).cyan(),
        ctx.kubeconfig.display()
    );

    let auth_config = provider.auth_config().await?;
    let storage_config = provider.storage_config().await?;
    ctx.bootstrap(ctx.target(cluster.context_name.clone()))
        .bootstrap(&auth_config, &storage_config)
        .await?;

    println!(
        "{} Cluster {} is ready at {}",
        style("✓").green().bold(),
        style(&cluster.name).cyan(),
        cluster.endpoint_url
    );
    Ok(())
}

/// Delete every stack of a cluster and forget it
///
/// The registry entry is only removed once all stacks are gone.
pub async fn delete(ctx: &Context, name: &str) -> Result<()> {
    println!(
        "{} Deleting cluster {}",
        style("→").blue().bold(),
        style(name).cyan()
    );

    let provider = ctx.provider(name)?;
    let mut progress = StepProgress::new("deleting");
    let report = provider.teardown_cluster(&mut progress).await;
    let deleted = report.deleted().len();
    report.into_result()?;

    let mut registry = ctx.registry()?;
    if registry.remove(name) {
        registry.commit()?;
        println!(
            "  Removed {} from {}",
            style(name).cyan(),
            ctx.kubeconfig.display()
        );
    }

    println!(
        "{} Deleted cluster {} ({} stack(s) removed)",
        style("✓").green().bold(),
        style(name).cyan(),
        deleted
    );
    Ok(())
}

/// List registered clusters, or show one with its live stack status
pub async fn get(ctx: &Context, name: Option<&str>) -> Result<()> {
    let registry = ctx.registry()?;
    match name {
        None => {
            list(&registry);
            Ok(())
        }
        Some(name) => show(ctx, &registry, name).await,
    }
}

fn list(registry: &Registry) {
    let entries = registry.entries();
    if entries.is_empty() {
        println!("No clusters registered in {}", registry.path().display());
        return;
    }
    println!("{}", style("Clusters:").bold());
    for entry in entries {
        let marker = if entry.is_current {
            style("*").green().bold()
        } else {
            style(" ")
        };
        println!("  {} {}  {}", marker, style(&entry.context_name).cyan(), style(&entry.server_url).dim());
    }
}

async fn show(ctx: &Context, registry: &Registry, name: &str) -> Result<()> {
    match registry.entry(name) {
        Some(entry) => print_entry(&entry),
        None => println!(
            "{} {} is not registered in {}",
            style("⚠").yellow(),
            style(name).cyan(),
            registry.path().display()
        ),
    }

    let provider = ctx.provider(name)?;
    println!("  {}", style("Stacks:").bold());
    for (step, status) in provider.status().await? {
        let status = match status {
            StackStatus::CreateComplete => style(status.to_string()).green(),
            StackStatus::Failed => style(status.to_string()).red(),
            StackStatus::Absent => style(status.to_string()).dim(),
            _ => style(status.to_string()).yellow(),
        };
        println!("    {:<14} {}", step, status);
    }

    if let Some(cluster) = provider.describe_cluster().await? {
        println!("  Control plane: {}", cluster.control_plane_name);
        println!("  Filesystem:    {}", cluster.filesystem_id);
        println!("  Worker SG:     {}", cluster.worker_security_group);
    }
    Ok(())
}

fn print_entry(entry: &RegistryEntry) {
    let current = if entry.is_current { " (current)" } else { "" };
    println!(
        "{} {}{}",
        style("Cluster").bold(),
        style(&entry.cluster_name).cyan(),
        current
    );
    println!("  Server:  {}", entry.server_url);
    println!("  Context: {}", entry.context_name);
    println!("  User:    {}", entry.user_name);
    if let Some(exec) = &entry.auth_exec {
        println!("  Auth:    {}", exec.command_line());
    }
}
