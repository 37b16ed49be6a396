//! EKS clusters built from six CloudFormation stacks
//!
//! | step          | stack                  | reads                                | publishes |
//! |---------------|------------------------|--------------------------------------|-----------|
//! | role          | `{cluster}-role`       |                                      | `role_arn` |
//! | network       | `{cluster}-vpc`        |                                      | `security_groups`, `subnet_ids`, `vpc_id` |
//! | control-plane | `{cluster}-cluster`    | `security_groups`, `subnet_ids`      | `endpoint_url`, `ca_cert` |
//! | workers       | `{cluster}-node-group` | `security_groups`, `subnet_ids`, `vpc_id` | `node_role_arn`, `node_instance_profile`, `node_instance_role`, `node_security_group` |
//! | spot-workers  | `{cluster}-spot-nodes` | `subnet_ids`, node identity          | |
//! | utilities     | `{cluster}-utilities`  | `subnet_ids`, `node_security_group`  | `filesystem_id` |
//!
//! The control plane assumes the role through the role stack's export, so
//! `role_arn` is published without being an input.

use async_trait::async_trait;
use hubctl_core::{AuthExec, Capability, Cluster, StackStatus};
use hubctl_engine::templates;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::{ClusterProvider, ProviderKind};
use crate::error::{CloudError, Result};
use crate::pipeline::{Backends, Pipeline, StepResults, TeardownReport};
use crate::progress::ProgressObserver;
use crate::step::{OutputSource, ResourceStep, label};

const CONTROL_PLANE_LABEL: &str = "{cluster}-cluster";
const ROLE_STACK_LABEL: &str = "{cluster}-role";

/// Address ranges of the cluster network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkOptions {
    pub vpc_block: String,
    pub subnet_blocks: [String; 3],
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            vpc_block: "10.42.0.0/16".to_string(),
            subnet_blocks: [
                "10.42.1.0/24".to_string(),
                "10.42.2.0/24".to_string(),
                "10.42.3.0/24".to_string(),
            ],
        }
    }
}

/// Sizing of the on-demand and spot worker groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeOptions {
    pub instance_type: String,
    pub desired_size: u32,
    pub max_size: u32,
    /// Root volume size in GiB
    pub volume_size: u32,
    /// EC2 key pair for SSH access to workers
    pub key_name: Option<String>,
    pub spot_instance_types: [String; 3],
    pub spot_max_size: u32,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            instance_type: "m5.large".to_string(),
            desired_size: 1,
            max_size: 1,
            volume_size: 100,
            key_name: None,
            spot_instance_types: [
                "m5.large".to_string(),
                "m5a.large".to_string(),
                "m4.large".to_string(),
            ],
            spot_max_size: 10,
        }
    }
}

/// Settings of EKS clusters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EksOptions {
    /// AWS region; the CLI default applies when unset
    pub region: Option<String>,
    /// IAM group whose members become cluster administrators
    pub admin_group: String,
    pub network: NetworkOptions,
    pub nodes: NodeOptions,
}

impl Default for EksOptions {
    fn default() -> Self {
        Self {
            region: None,
            admin_group: "admin".to_string(),
            network: NetworkOptions::default(),
            nodes: NodeOptions::default(),
        }
    }
}

/// The six steps of an EKS cluster, in creation order
pub fn eks_steps(options: &EksOptions) -> Vec<ResourceStep> {
    let network = &options.network;
    let nodes = &options.nodes;

    let role = ResourceStep::new("role", "role", templates::SERVICE_ROLE)
        .output("RoleArn", "role_arn")
        .capability(Capability::NamedIam);

    let vpc = ResourceStep::new("network", "vpc", templates::VPC)
        .literal("VpcBlock", &network.vpc_block)
        .literal("Subnet01Block", &network.subnet_blocks[0])
        .literal("Subnet02Block", &network.subnet_blocks[1])
        .literal("Subnet03Block", &network.subnet_blocks[2])
        .output("SecurityGroups", "security_groups")
        .output("SubnetIds", "subnet_ids")
        .output("VpcId", "vpc_id");

    let control_plane = ResourceStep::new("control-plane", "cluster", templates::CONTROL_PLANE)
        .label("ClusterName", CONTROL_PLANE_LABEL)
        .input("ControlPlaneSecurityGroup", "security_groups")
        .input("Subnets", "subnet_ids")
        .label("RoleStackName", ROLE_STACK_LABEL)
        .outputs_from(OutputSource::ControlPlane(CONTROL_PLANE_LABEL.to_string()))
        .output("Endpoint", "endpoint_url")
        .output("CertificateAuthorityData", "ca_cert");

    let mut workers = ResourceStep::new("workers", "node-group", templates::NODE_GROUP)
        .label("ClusterName", CONTROL_PLANE_LABEL)
        .input("ClusterControlPlaneSecurityGroup", "security_groups")
        .input("Subnets", "subnet_ids")
        .input("VpcId", "vpc_id")
        .label("NodeGroupName", "{cluster}-ondemand")
        .literal("NodeInstanceType", &nodes.instance_type)
        .literal("NodeAutoScalingGroupDesiredCapacity", nodes.desired_size.to_string())
        .literal("NodeAutoScalingGroupMaxSize", nodes.max_size.max(nodes.desired_size).to_string())
        .literal("NodeVolumeSize", nodes.volume_size.to_string())
        .output("NodeInstanceRole", "node_role_arn")
        .output("NodeInstanceProfile", "node_instance_profile")
        .output("NodeInstanceRoleName", "node_instance_role")
        .output("NodeSecurityGroup", "node_security_group")
        .capability(Capability::Iam);
    if let Some(key_name) = &nodes.key_name {
        workers = workers.literal("KeyName", key_name);
    }

    // no outputs: nothing downstream reads the spot group
    let spot_workers = ResourceStep::new("spot-workers", "spot-nodes", templates::SPOT_NODES)
        .label("ClusterName", CONTROL_PLANE_LABEL)
        .input("Subnets", "subnet_ids")
        .input("NodeInstanceProfile", "node_instance_profile")
        .input("NodeInstanceRole", "node_instance_role")
        .input("NodeSecurityGroup", "node_security_group")
        .literal("SpotInstanceTypes", nodes.spot_instance_types.join(","))
        .literal("SpotMaxSize", nodes.spot_max_size.to_string())
        .literal("NodeVolumeSize", nodes.volume_size.to_string());

    let utilities = ResourceStep::new("utilities", "utilities", templates::UTILITIES)
        .input("Subnets", "subnet_ids")
        .input("NodeSecurityGroup", "node_security_group")
        .output("efsId", "filesystem_id");

    vec![role, vpc, control_plane, workers, spot_workers, utilities]
}

/// A cluster name bound to the EKS pipeline
#[derive(Debug)]
pub struct EksProvider {
    cluster: String,
    options: EksOptions,
    pipeline: Pipeline,
    results: Mutex<Option<StepResults>>,
}

impl EksProvider {
    pub fn new(cluster: &str, backends: Backends, options: EksOptions) -> Result<Self> {
        Ok(Self {
            cluster: cluster.to_string(),
            pipeline: Pipeline::new(eks_steps(&options), backends)?,
            options,
            results: Mutex::new(None),
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn options(&self) -> &EksOptions {
        &self.options
    }

    /// Name of the EKS control plane, also used in the CloudFormation templates
    pub fn control_plane_name(&self) -> String {
        label(CONTROL_PLANE_LABEL, &self.cluster)
    }

    fn cached(&self) -> Option<StepResults> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn remember(&self, results: &StepResults) {
        *self.results.lock().unwrap_or_else(|e| e.into_inner()) = Some(results.clone());
    }

    /// Results of the provisioned cluster, looked up once
    async fn results(&self) -> Result<StepResults> {
        if let Some(results) = self.cached() {
            return Ok(results);
        }
        match self.pipeline.inspect(&self.cluster).await? {
            Some(results) => {
                self.remember(&results);
                Ok(results)
            }
            None => Err(CloudError::NotFound {
                name: self.cluster.clone(),
            }),
        }
    }

    fn cluster_from(&self, results: &StepResults) -> Result<Cluster> {
        Ok(Cluster {
            name: self.cluster.clone(),
            control_plane_name: self.control_plane_name(),
            endpoint_url: results.require("endpoint_url")?.to_string(),
            ca_cert: results.require("ca_cert")?.to_string(),
            context_name: self.cluster.clone(),
            worker_security_group: results.require("node_security_group")?.to_string(),
            filesystem_id: results.require("filesystem_id")?.to_string(),
        })
    }
}

#[async_trait]
impl ClusterProvider for EksProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Eks
    }

    fn cluster_name(&self) -> &str {
        &self.cluster
    }

    async fn create_cluster(&self, observer: &mut dyn ProgressObserver) -> Result<Cluster> {
        let results = self.pipeline.create(&self.cluster, observer).await?;
        self.remember(&results);
        self.cluster_from(&results)
    }

    async fn teardown_cluster(&self, observer: &mut dyn ProgressObserver) -> TeardownReport {
        *self.results.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.pipeline.teardown(&self.cluster, observer).await
    }

    async fn describe_cluster(&self) -> Result<Option<Cluster>> {
        match self.results().await {
            Ok(results) => self.cluster_from(&results).map(Some),
            Err(CloudError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn status(&self) -> Result<Vec<(String, StackStatus)>> {
        self.pipeline.status(&self.cluster).await
    }

    fn auth_exec(&self) -> AuthExec {
        let mut args = vec![
            "eks".to_string(),
            "get-token".to_string(),
            "--cluster-name".to_string(),
            self.control_plane_name(),
        ];
        if let Some(region) = &self.options.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        AuthExec::new("aws", args)
    }

    async fn auth_config(&self) -> Result<String> {
        let results = self.results().await?;
        let backends = self.pipeline.backends();

        let admins = match backends
            .directory
            .group_members(&self.options.admin_group)
            .await
        {
            Ok(members) => members,
            Err(CloudError::NotFound { .. }) => {
                tracing::warn!(
                    "admin group {} does not exist, no users will be mapped into the cluster",
                    self.options.admin_group
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(backends.renderer.render(
            templates::AUTH_CONFIG,
            &serde_json::json!({
                "node_role_arn": results.require("node_role_arn")?,
                "admins": admins,
            }),
        )?)
    }

    async fn storage_config(&self) -> Result<String> {
        let results = self.results().await?;
        Ok(self.pipeline.backends().renderer.render(
            templates::STORAGE_CONFIG,
            &serde_json::json!({
                "cluster_name": self.control_plane_name(),
                "region": self.options.region.clone().unwrap_or_default(),
                "filesystem_id": results.require("filesystem_id")?,
            }),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Principal;
    use crate::progress::NoProgress;
    use crate::stack::MemoryStackManager;
    use crate::testing::demo_manager;

    fn provider(mgr: &MemoryStackManager, cluster: &str) -> EksProvider {
        EksProvider::new(cluster, Backends::memory(mgr), EksOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_demo_scenario() {
        let mgr = demo_manager("demo");
        let eks = provider(&mgr, "demo");

        let cluster = eks.create_cluster(&mut NoProgress).await.unwrap();
        assert_eq!(cluster.endpoint_url, "https://x");
        assert_eq!(cluster.ca_cert, "Y");
        assert_eq!(cluster.worker_security_group, "sg-1");
        assert_eq!(cluster.control_plane_name, "demo-cluster");
        assert_eq!(cluster.context_name, "demo");

        let report = eks.teardown_cluster(&mut NoProgress).await;
        assert!(report.into_result().is_ok());
        insta::assert_debug_snapshot!(mgr.deletes(), @r###"
        [
            "demo-utilities",
            "demo-spot-nodes",
            "demo-node-group",
            "demo-cluster",
            "demo-vpc",
            "demo-role",
        ]
        "###);

        // a second teardown finds everything already gone
        let again = eks.teardown_cluster(&mut NoProgress).await;
        assert!(again.is_complete());
        assert!(again.deleted().is_empty());
        assert_eq!(eks.describe_cluster().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_describe_reads_existing_stacks() {
        let mgr = demo_manager("demo");
        provider(&mgr, "demo")
            .create_cluster(&mut NoProgress)
            .await
            .unwrap();

        let fresh = provider(&mgr, "demo");
        let cluster = fresh.describe_cluster().await.unwrap().unwrap();
        assert_eq!(cluster.filesystem_id, "fs-1");
        assert_eq!(mgr.operation_counts().creates, 6);
    }

    #[test]
    fn test_auth_exec() {
        let mgr = MemoryStackManager::new();
        let options = EksOptions {
            region: Some("us-west-2".to_string()),
            ..EksOptions::default()
        };
        let eks = EksProvider::new("demo", Backends::memory(&mgr), options).unwrap();

        let exec = eks.auth_exec();
        assert_eq!(exec.api_version, AuthExec::API_VERSION);
        assert_eq!(
            exec.command_line(),
            "aws eks get-token --cluster-name demo-cluster --region us-west-2"
        );
    }

    #[tokio::test]
    async fn test_auth_config_maps_node_role_and_admins() {
        let mgr = demo_manager("demo");
        mgr.script_group("admin", vec![Principal::new("arn:aws:iam::1:user/ann", "ann")]);
        let eks = provider(&mgr, "demo");
        eks.create_cluster(&mut NoProgress).await.unwrap();

        let manifest = eks.auth_config().await.unwrap();
        assert!(manifest.contains(r#"rolearn: "arn:aws:iam::1:role/demo-node""#));
        assert!(manifest.contains(r#"userarn: "arn:aws:iam::1:user/ann""#));
    }

    #[tokio::test]
    async fn test_auth_config_without_admin_group() {
        let mgr = demo_manager("demo");
        let eks = provider(&mgr, "demo");
        eks.create_cluster(&mut NoProgress).await.unwrap();

        let manifest = eks.auth_config().await.unwrap();
        assert!(manifest.contains("mapUsers: |\n    []"));
    }

    #[tokio::test]
    async fn test_storage_config() {
        let mgr = demo_manager("demo");
        let eks = provider(&mgr, "demo");
        eks.create_cluster(&mut NoProgress).await.unwrap();

        let manifest = eks.storage_config().await.unwrap();
        assert!(manifest.contains("fileSystemId: fs-1"));
        assert!(manifest.contains(r#"hubctl/cluster: "demo-cluster""#));
    }

    #[tokio::test]
    async fn test_manifests_need_a_cluster() {
        let mgr = MemoryStackManager::new();
        let err = provider(&mgr, "ghost").storage_config().await.unwrap_err();
        assert!(matches!(err, CloudError::NotFound { ref name } if name == "ghost"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: EksOptions = serde_json::from_value(serde_json::json!({
            "region": "eu-west-1",
            "nodes": {"instanceType": "r5.xlarge", "keyName": "ops"},
        }))
        .unwrap();
        assert_eq!(options.nodes.instance_type, "r5.xlarge");
        assert_eq!(options.nodes.volume_size, 100);
        assert_eq!(options.admin_group, "admin");

        let steps = eks_steps(&options);
        let workers = steps.iter().find(|s| s.name() == "workers").unwrap();
        let params = workers
            .parameters_for("demo", &{
                let mut r = StepResults::new();
                r.insert("security_groups", "sg").unwrap();
                r.insert("subnet_ids", "s").unwrap();
                r.insert("vpc_id", "v").unwrap();
                r
            })
            .unwrap();
        assert_eq!(params["KeyName"], "ops");
        assert_eq!(params["NodeInstanceType"], "r5.xlarge");
    }
}
