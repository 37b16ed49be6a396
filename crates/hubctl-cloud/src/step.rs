//! Resource steps
//!
//! A step owns exactly one stack, `{cluster}-{suffix}`. It declares which
//! earlier results it reads (through its parameters) and which results it
//! publishes (through its output mapping), so a [`Pipeline`](crate::Pipeline)
//! can check the ordering before running anything.

use hubctl_core::{Capability, Stack, StackStatus};
use std::collections::BTreeMap;

use crate::error::{CloudError, Result};
use crate::pipeline::{Backends, StepResults};
use crate::progress::StepOutcome;
use crate::stack::Parameters;

/// Placeholder replaced by the cluster name in labels
pub const CLUSTER_PLACEHOLDER: &str = "{cluster}";

/// Where a stack parameter gets its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A result published by an earlier step
    Input(String),
    /// A fixed value
    Literal(String),
    /// A pattern in which `{cluster}` is replaced by the cluster name
    Label(String),
}

impl ParamValue {
    fn resolve(&self, cluster: &str, results: &StepResults) -> Option<String> {
        match self {
            ParamValue::Input(key) => results.get(key).map(str::to_string),
            ParamValue::Literal(value) => Some(value.clone()),
            ParamValue::Label(pattern) => Some(label(pattern, cluster)),
        }
    }
}

/// Where a step reads its declared outputs from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSource {
    /// Outputs of the step's own stack
    Stack,
    /// The managed control plane named by the label, with keys `Name`,
    /// `Endpoint` and `CertificateAuthorityData`
    ControlPlane(String),
}

/// Expand `{cluster}` in a label pattern
pub fn label(pattern: &str, cluster: &str) -> String {
    pattern.replace(CLUSTER_PLACEHOLDER, cluster)
}

/// One stack in the provisioning pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStep {
    name: String,
    suffix: String,
    template: String,
    parameters: Vec<(String, ParamValue)>,
    outputs: Vec<(String, String)>,
    capabilities: Vec<Capability>,
    output_source: OutputSource,
}

impl ResourceStep {
    pub fn new(name: impl Into<String>, suffix: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
            template: template.into(),
            parameters: Vec::new(),
            outputs: Vec::new(),
            capabilities: Vec::new(),
            output_source: OutputSource::Stack,
        }
    }

    /// Stack parameter fed from an earlier step's result
    pub fn input(self, parameter: &str, result_key: &str) -> Self {
        self.param(parameter, ParamValue::Input(result_key.to_string()))
    }

    pub fn literal(self, parameter: &str, value: impl Into<String>) -> Self {
        self.param(parameter, ParamValue::Literal(value.into()))
    }

    pub fn label(self, parameter: &str, pattern: &str) -> Self {
        self.param(parameter, ParamValue::Label(pattern.to_string()))
    }

    pub fn param(mut self, parameter: &str, value: ParamValue) -> Self {
        self.parameters.push((parameter.to_string(), value));
        self
    }

    /// Publish `source_key` of the output source as result `result_key`
    pub fn output(mut self, source_key: &str, result_key: &str) -> Self {
        self.outputs
            .push((source_key.to_string(), result_key.to_string()));
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn outputs_from(mut self, source: OutputSource) -> Self {
        self.output_source = source;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn stack_name(&self, cluster: &str) -> String {
        format!("{}-{}", cluster, self.suffix)
    }

    /// Result keys this step reads, in parameter order
    pub fn input_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (_, value) in &self.parameters {
            if let ParamValue::Input(key) = value
                && !keys.contains(&key.as_str())
            {
                keys.push(key);
            }
        }
        keys
    }

    /// Result keys this step publishes
    pub fn result_keys(&self) -> Vec<&str> {
        self.outputs.iter().map(|(_, key)| key.as_str()).collect()
    }

    /// Stack parameters for `cluster`, resolved against earlier results
    pub fn parameters_for(&self, cluster: &str, results: &StepResults) -> Result<Parameters> {
        self.parameters
            .iter()
            .map(|(name, value)| {
                value
                    .resolve(cluster, results)
                    .map(|v| (name.clone(), v))
                    .ok_or_else(|| CloudError::StepFailed {
                        step: self.name.clone(),
                        reason: format!("parameter '{}' needs a result no earlier step produced", name),
                    })
            })
            .collect()
    }

    /// The step's stack, if one exists
    pub async fn current(&self, backends: &Backends, cluster: &str) -> Result<Option<Stack>> {
        match backends.stacks.describe(&self.stack_name(cluster)).await {
            Ok(stack) if stack.status.is_present() => Ok(Some(stack)),
            Ok(_) | Err(CloudError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether the stack exists and is complete
    pub async fn is_satisfied(&self, backends: &Backends, cluster: &str) -> Result<bool> {
        Ok(self
            .current(backends, cluster)
            .await?
            .is_some_and(|stack| stack.is_complete()))
    }

    /// Create the stack and return the results it publishes
    ///
    /// A stack left in progress by an earlier run is waited on, not created
    /// again; one left failed is deleted first.
    pub async fn apply(
        &self,
        backends: &Backends,
        cluster: &str,
        inputs: &StepResults,
    ) -> Result<BTreeMap<String, String>> {
        let stack_name = self.stack_name(cluster);
        let parameters = self.parameters_for(cluster, inputs)?;
        let body = backends
            .renderer
            .render(&self.template, &serde_json::json!({ "cluster": cluster }))?;

        let mut leftover = self.current(backends, cluster).await?;
        if let Some(stack) = &leftover
            && !stack.status.is_terminal()
        {
            tracing::info!(
                "stack {} is still {} from an earlier run, waiting for it",
                stack_name,
                stack.status
            );
            leftover = Some(backends.stacks.wait(&stack_name).await?);
        }

        match leftover {
            Some(stack) if stack.is_complete() => {
                return self.collect_outputs(backends, cluster, &stack).await;
            }
            Some(stack) if stack.status == StackStatus::Failed => {
                tracing::warn!(
                    "stack {} was left failed by an earlier run, deleting it before retrying",
                    stack_name
                );
                backends.stacks.delete(&stack_name).await?;
            }
            _ => {}
        }

        tracing::info!("step {}: creating stack {}", self.name, stack_name);
        let stack = backends
            .stacks
            .create(&stack_name, &body, &parameters, &self.capabilities)
            .await?;

        if !stack.is_complete() {
            return Err(CloudError::StepFailed {
                step: self.name.clone(),
                reason: format!("stack {} ended in {}", stack_name, stack.status),
            });
        }

        self.collect_outputs(backends, cluster, &stack).await
    }

    /// Declared results of a complete stack
    pub async fn collect_outputs(
        &self,
        backends: &Backends,
        cluster: &str,
        stack: &Stack,
    ) -> Result<BTreeMap<String, String>> {
        let available = match &self.output_source {
            OutputSource::Stack => stack.outputs.clone(),
            OutputSource::ControlPlane(pattern) => {
                let name = label(pattern, cluster);
                let control_plane = match backends.directory.describe_cluster(&name).await {
                    Ok(cp) => cp,
                    Err(CloudError::NotFound { .. }) => {
                        return Err(CloudError::StepFailed {
                            step: self.name.clone(),
                            reason: format!("control plane {} not found", name),
                        });
                    }
                    Err(e) => return Err(e),
                };
                BTreeMap::from([
                    ("Name".to_string(), control_plane.name),
                    ("Endpoint".to_string(), control_plane.endpoint_url),
                    ("CertificateAuthorityData".to_string(), control_plane.ca_cert),
                ])
            }
        };

        self.outputs
            .iter()
            .map(|(source_key, result_key)| {
                available
                    .get(source_key)
                    .map(|value| (result_key.clone(), value.clone()))
                    .ok_or_else(|| CloudError::StepFailed {
                        step: self.name.clone(),
                        reason: format!("stack {} has no output '{}'", stack.name, source_key),
                    })
            })
            .collect()
    }

    /// Delete the stack; absent stacks are not an error
    pub async fn teardown(&self, backends: &Backends, cluster: &str) -> Result<StepOutcome> {
        let stack_name = self.stack_name(cluster);
        let existed = backends.stacks.exists(&stack_name).await?;
        backends.stacks.delete(&stack_name).await?;

        if existed {
            tracing::info!("step {}: deleted stack {}", self.name, stack_name);
            Ok(StepOutcome::Deleted)
        } else {
            tracing::info!("step {}: stack {} already absent", self.name, stack_name);
            Ok(StepOutcome::AlreadyAbsent)
        }
    }
}
