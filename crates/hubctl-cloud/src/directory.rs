//! Managed resources that live outside stack outputs
//!
//! The control plane endpoint and CA bundle come from the managed-cluster
//! API, and the cluster administrators from an identity group.

use async_trait::async_trait;
use serde::Deserialize;

use crate::aws::{AwsCli, parse_reply, provider_error};
use crate::error::{CloudError, Result};

/// Connection data of a managed control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlane {
    pub name: String,
    pub endpoint_url: String,
    pub ca_cert: String,
}

/// An identity allowed to administer clusters
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Principal {
    pub arn: String,
    pub username: String,
}

impl Principal {
    pub fn new(arn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            username: username.into(),
        }
    }
}

/// Lookups against the provider's managed-cluster and identity APIs
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Endpoint and CA of a control plane, [`CloudError::NotFound`] if absent
    async fn describe_cluster(&self, control_plane_name: &str) -> Result<ControlPlane>;

    /// Members of an identity group, [`CloudError::NotFound`] if the group is absent
    async fn group_members(&self, group: &str) -> Result<Vec<Principal>>;
}

/// EKS and IAM through the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsDirectory {
    aws: AwsCli,
}

impl AwsDirectory {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }
}

#[derive(Deserialize)]
struct DescribeClusterReply {
    cluster: EksCluster,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EksCluster {
    name: String,
    endpoint: Option<String>,
    certificate_authority: Option<CertificateAuthority>,
}

#[derive(Deserialize)]
struct CertificateAuthority {
    data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetGroupReply {
    #[serde(default)]
    users: Vec<IamUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamUser {
    arn: String,
    user_name: String,
}

#[async_trait]
impl ClusterDirectory for AwsDirectory {
    async fn describe_cluster(&self, control_plane_name: &str) -> Result<ControlPlane> {
        let output = self
            .aws
            .call(&["eks", "describe-cluster", "--name", control_plane_name])
            .await?;
        if !output.success() {
            if output.stderr.contains("ResourceNotFoundException") {
                return Err(CloudError::NotFound {
                    name: control_plane_name.to_string(),
                });
            }
            return Err(provider_error(control_plane_name, &output));
        }

        let reply: DescribeClusterReply = parse_reply(control_plane_name, &output)?;
        let missing = |field: &str| CloudError::Response {
            resource: control_plane_name.to_string(),
            message: format!("cluster has no {} yet", field),
        };

        Ok(ControlPlane {
            endpoint_url: reply.cluster.endpoint.ok_or_else(|| missing("endpoint"))?,
            ca_cert: reply
                .cluster
                .certificate_authority
                .and_then(|ca| ca.data)
                .ok_or_else(|| missing("certificate authority"))?,
            name: reply.cluster.name,
        })
    }

    async fn group_members(&self, group: &str) -> Result<Vec<Principal>> {
        let output = self
            .aws
            .call(&["iam", "get-group", "--group-name", group])
            .await?;
        if !output.success() {
            if output.stderr.contains("NoSuchEntity") {
                return Err(CloudError::NotFound {
                    name: group.to_string(),
                });
            }
            return Err(provider_error(group, &output));
        }

        let reply: GetGroupReply = parse_reply(group, &output)?;
        Ok(reply
            .users
            .into_iter()
            .map(|u| Principal::new(u.arn, u.user_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubctl_core::{CommandOutput, ScriptedRunner};
    use std::sync::Arc;

    fn directory(runner: &ScriptedRunner) -> AwsDirectory {
        AwsDirectory::new(AwsCli::new(
            Arc::new(runner.clone()),
            Some("us-west-2".to_string()),
        ))
    }

    #[tokio::test]
    async fn test_describe_cluster() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws",
            &["eks", "describe-cluster"],
            CommandOutput::ok(
                r#"{"cluster": {"name": "demo-cluster", "endpoint": "https://x",
                    "certificateAuthority": {"data": "Y"}, "status": "ACTIVE"}}"#,
            ),
        );

        let cp = directory(&runner).describe_cluster("demo-cluster").await.unwrap();
        assert_eq!(cp.endpoint_url, "https://x");
        assert_eq!(cp.ca_cert, "Y");
        assert_eq!(
            runner.command_lines(),
            vec!["aws eks describe-cluster --name demo-cluster --output=json --region=us-west-2"]
        );
    }

    #[tokio::test]
    async fn test_describe_missing_cluster() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws",
            &["eks"],
            CommandOutput::failed(
                254,
                "An error occurred (ResourceNotFoundException) when calling the DescribeCluster operation: No cluster found for name: demo-cluster.",
            ),
        );
        let err = directory(&runner).describe_cluster("demo-cluster").await.unwrap_err();
        assert!(matches!(err, CloudError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_group_members() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "aws",
            &["iam", "get-group"],
            CommandOutput::ok(
                r#"{"Users": [{"UserName": "ann", "Arn": "arn:aws:iam::1:user/ann", "UserId": "A"}],
                    "Group": {"GroupName": "admin"}}"#,
            ),
        );
        let members = directory(&runner).group_members("admin").await.unwrap();
        assert_eq!(members, vec![Principal::new("arn:aws:iam::1:user/ann", "ann")]);
    }
}
