//! Read-only view of a running hub through the Kubernetes API

use k8s_openapi::api::core::v1::Service;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};

use crate::error::{KubeError, Result};
use crate::target::KubeTarget;

/// Service the hub chart exposes to the outside world
pub const PUBLIC_SERVICE: &str = "proxy-public";

/// Looks up hub services in a cluster
#[derive(Clone)]
pub struct HubInspector {
    client: Client,
}

impl HubInspector {
    /// Connect using the target's kubeconfig and context
    pub async fn connect(target: &KubeTarget) -> Result<Self> {
        let kubeconfig = match &target.kubeconfig {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| KubeError::Config(e.to_string()))?;

        let options = KubeConfigOptions {
            context: target.context.clone(),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| KubeError::Config(e.to_string()))?;

        Ok(Self {
            client: Client::try_from(config)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Public address of the hub in `namespace`, `None` while the load
    /// balancer is still being provisioned or the hub does not exist
    pub async fn public_address(&self, namespace: &str) -> Result<Option<String>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services.get_opt(PUBLIC_SERVICE).await?;
        Ok(service.as_ref().and_then(ingress_address))
    }
}

/// First load balancer hostname or IP of a service
pub fn ingress_address(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .iter()
        .find_map(|ingress| ingress.hostname.clone().or_else(|| ingress.ip.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};

    fn service(ingress: Vec<LoadBalancerIngress>) -> Service {
        Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(ingress),
                }),
                ..ServiceStatus::default()
            }),
            ..Service::default()
        }
    }

    #[test]
    fn test_hostname_preferred() {
        let svc = service(vec![LoadBalancerIngress {
            hostname: Some("a1b2.elb.amazonaws.com".to_string()),
            ip: Some("10.0.0.1".to_string()),
            ..LoadBalancerIngress::default()
        }]);
        assert_eq!(ingress_address(&svc).as_deref(), Some("a1b2.elb.amazonaws.com"));
    }

    #[test]
    fn test_ip_fallback() {
        let svc = service(vec![LoadBalancerIngress {
            ip: Some("34.1.2.3".to_string()),
            ..LoadBalancerIngress::default()
        }]);
        assert_eq!(ingress_address(&svc).as_deref(), Some("34.1.2.3"));
    }

    #[test]
    fn test_pending_load_balancer() {
        assert_eq!(ingress_address(&service(vec![])), None);
        assert_eq!(ingress_address(&Service::default()), None);
    }
}
