//! Use command - switch the current kube context to a registered cluster

use console::style;

use super::Context;
use crate::error::Result;

pub fn run(ctx: &Context, cluster: &str) -> Result<()> {
    let mut registry = ctx.registry()?;
    registry.set_current(cluster)?;
    registry.commit()?;

    println!(
        "{} Switched to cluster {}",
        style("✓").green().bold(),
        style(cluster).cyan()
    );
    Ok(())
}
