//! `aws` command-line access shared by the stack manager and the directory

use hubctl_core::{CommandOutput, CommandRunner, Invocation, Tool};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{CloudError, Result};

/// The `aws` CLI, pinned to a region when one is configured
#[derive(Debug, Clone)]
pub struct AwsCli {
    tool: Tool,
    region: Option<String>,
}

impl AwsCli {
    pub fn new(runner: Arc<dyn CommandRunner>, region: Option<String>) -> Self {
        Self {
            tool: Tool::new("aws", runner),
            region,
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Run `aws <args> --output=json [--region=..]`
    ///
    /// The raw output is returned even on a non-zero exit so callers can
    /// recognize provider error codes in stderr.
    pub async fn call(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut invocation = Invocation::new(args.iter().copied()).flag("output", "json");
        if let Some(region) = &self.region {
            invocation = invocation.flag("region", region.as_str());
        }
        Ok(self.tool.run(invocation).await?)
    }
}

/// Error for a failed call, with stderr as the message
pub(crate) fn provider_error(resource: &str, output: &CommandOutput) -> CloudError {
    let message = output.stderr.trim();
    CloudError::Provider {
        resource: resource.to_string(),
        message: if message.is_empty() {
            format!("aws exited with status {}", output.exit_code)
        } else {
            message.to_string()
        },
    }
}

/// Decode the JSON reply of a successful call
pub(crate) fn parse_reply<T: DeserializeOwned>(resource: &str, output: &CommandOutput) -> Result<T> {
    serde_json::from_str(&output.stdout).map_err(|e| CloudError::Response {
        resource: resource.to_string(),
        message: e.to_string(),
    })
}
