//! CloudFormation stack manager driven through the `aws` CLI

use async_trait::async_trait;
use hubctl_core::{Capability, Stack, StackStatus};
use serde::Deserialize;

use super::{
    Parameters, StackManager, WaitPolicy, absent_if_missing, wait_until_deleted,
    wait_until_terminal,
};
use crate::aws::{AwsCli, parse_reply, provider_error};
use crate::error::{CloudError, Result};

/// Stacks managed with `aws cloudformation`
#[derive(Debug, Clone)]
pub struct AwsStackManager {
    aws: AwsCli,
    policy: WaitPolicy,
}

impl AwsStackManager {
    pub fn new(aws: AwsCli, policy: WaitPolicy) -> Self {
        Self { aws, policy }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksReply {
    #[serde(default)]
    stacks: Vec<StackDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackDescription {
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    outputs: Vec<StackOutput>,
    #[serde(default)]
    parameters: Vec<StackParameter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackOutput {
    output_key: String,
    output_value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackParameter {
    parameter_key: String,
    #[serde(default)]
    parameter_value: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterArg<'a> {
    parameter_key: &'a str,
    parameter_value: &'a str,
}

impl From<StackDescription> for Stack {
    fn from(desc: StackDescription) -> Self {
        let mut stack = Stack::new(desc.stack_name, StackStatus::from_provider(&desc.stack_status));
        stack.outputs = desc
            .outputs
            .into_iter()
            .map(|o| (o.output_key, o.output_value))
            .collect();
        stack.parameters = desc
            .parameters
            .into_iter()
            .map(|p| (p.parameter_key, p.parameter_value))
            .collect();
        stack
    }
}

#[async_trait]
impl StackManager for AwsStackManager {
    async fn create(
        &self,
        name: &str,
        template_body: &str,
        parameters: &Parameters,
        capabilities: &[Capability],
    ) -> Result<Stack> {
        let parameter_json = serde_json::to_string(
            &parameters
                .iter()
                .map(|(k, v)| ParameterArg {
                    parameter_key: k,
                    parameter_value: v,
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| CloudError::Response {
            resource: name.to_string(),
            message: e.to_string(),
        })?;

        let mut args = vec![
            "cloudformation",
            "create-stack",
            "--stack-name",
            name,
            "--template-body",
            template_body,
        ];
        if !parameters.is_empty() {
            args.extend(["--parameters", parameter_json.as_str()]);
        }
        if !capabilities.is_empty() {
            args.push("--capabilities");
            for capability in capabilities {
                args.push(capability.as_provider_str());
            }
        }

        tracing::info!("creating stack {}", name);
        let output = self.aws.call(&args).await?;
        if !output.success() {
            if output.stderr.contains("AlreadyExistsException") {
                return Err(CloudError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            return Err(provider_error(name, &output));
        }

        wait_until_terminal(name, &self.policy, || self.describe(name)).await
    }

    async fn describe(&self, name: &str) -> Result<Stack> {
        let output = self
            .aws
            .call(&["cloudformation", "describe-stacks", "--stack-name", name])
            .await?;
        if !output.success() {
            if output.stderr.contains("does not exist") {
                return Err(CloudError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(provider_error(name, &output));
        }

        let reply: DescribeStacksReply = parse_reply(name, &output)?;
        reply
            .stacks
            .into_iter()
            .next()
            .map(Stack::from)
            .ok_or_else(|| CloudError::NotFound {
                name: name.to_string(),
            })
    }

    async fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            return Ok(());
        }

        tracing::info!("deleting stack {}", name);
        let output = self
            .aws
            .call(&["cloudformation", "delete-stack", "--stack-name", name])
            .await?;
        if !output.success() {
            return Err(provider_error(name, &output));
        }

        wait_until_deleted(name, &self.policy, || self.describe(name)).await
    }

    async fn wait(&self, name: &str) -> Result<Stack> {
        wait_until_terminal(name, &self.policy, || async {
            absent_if_missing(name, self.describe(name).await)
        })
        .await
    }
}
