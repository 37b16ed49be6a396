//! Templates compiled into the binary

/// CloudFormation template for the control-plane service role
pub const SERVICE_ROLE: &str = "aws/eks-service-role.yaml";
/// CloudFormation template for the network
pub const VPC: &str = "aws/eks-vpc.yaml";
/// CloudFormation template for the control plane
pub const CONTROL_PLANE: &str = "aws/eks-cluster.yaml";
/// CloudFormation template for on-demand workers
pub const NODE_GROUP: &str = "aws/eks-nodegroup.yaml";
/// CloudFormation template for spot workers
pub const SPOT_NODES: &str = "aws/spot-nodes.yaml";
/// CloudFormation template for the shared filesystem
pub const UTILITIES: &str = "aws/utilities.yaml";
/// ConfigMap mapping worker and admin identities into the cluster
pub const AUTH_CONFIG: &str = "aws/aws-auth-cm.yaml";
/// Storage classes backed by EBS and the shared filesystem
pub const STORAGE_CONFIG: &str = "aws/storage-class.yaml";

static EMBEDDED: &[(&str, &str)] = &[
    (SERVICE_ROLE, include_str!("../templates/aws/eks-service-role.yaml")),
    (VPC, include_str!("../templates/aws/eks-vpc.yaml")),
    (CONTROL_PLANE, include_str!("../templates/aws/eks-cluster.yaml")),
    (NODE_GROUP, include_str!("../templates/aws/eks-nodegroup.yaml")),
    (SPOT_NODES, include_str!("../templates/aws/spot-nodes.yaml")),
    (UTILITIES, include_str!("../templates/aws/utilities.yaml")),
    (AUTH_CONFIG, include_str!("../templates/aws/aws-auth-cm.yaml")),
    (STORAGE_CONFIG, include_str!("../templates/aws/storage-class.yaml")),
];

/// Source of an embedded template
pub fn embedded(name: &str) -> Option<&'static str> {
    EMBEDDED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
}

/// Names of all embedded templates
pub fn names() -> Vec<&'static str> {
    EMBEDDED.iter().map(|(n, _)| *n).collect()
}
