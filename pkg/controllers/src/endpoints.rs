//! Endpoint resolution: turns a Service reference into the addresses and target port
//! loxilb should forward to.

use tracing::debug;

use pkg_constants::loxilb::{ENDPOINT_WEIGHT, POD_LIST_TIMEOUT};
use pkg_loxilb::LoadBalancerEndpoint;
use pkg_state::ObjectStore;
use pkg_types::endpoint::Endpoints;
use pkg_types::ingress::ServiceBackendPort;
use pkg_types::service::{IntOrString, Service, ServicePort};

use crate::error::ReconcileError;

fn endpoint(ip: &str, port: u16) -> LoadBalancerEndpoint {
    LoadBalancerEndpoint {
        endpoint_ip: ip.to_string(),
        target_port: port,
        weight: ENDPOINT_WEIGHT,
        state: String::new(),
    }
}

fn no_ready_endpoints(namespace: &str, name: &str) -> ReconcileError {
    ReconcileError::NoReadyEndpoints {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

async fn fetch_endpoints(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> Result<Endpoints, ReconcileError> {
    store
        .get_endpoints(namespace, name)
        .await?
        .ok_or_else(|| no_ready_endpoints(namespace, name))
}

/// Every ready address of Service `namespace/name`, paired with `target_port`.
pub async fn endpoints_at_port(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    target_port: u16,
) -> Result<Vec<LoadBalancerEndpoint>, ReconcileError> {
    let eps = fetch_endpoints(store, namespace, name).await?;
    let resolved: Vec<LoadBalancerEndpoint> = eps
        .subsets
        .iter()
        .flat_map(|s| s.addresses.iter())
        .map(|addr| endpoint(&addr.ip, target_port))
        .collect();

    if resolved.is_empty() {
        return Err(no_ready_endpoints(namespace, name));
    }
    debug!(
        "Resolved {} endpoints for {}/{} at port {}",
        resolved.len(),
        namespace,
        name,
        target_port
    );
    Ok(resolved)
}

/// Endpoints for an Ingress backend. Numeric ports are the target port as-is; a named
/// port is looked up among the endpoint ports of each subset.
pub async fn resolve_backend(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    port: &ServiceBackendPort,
) -> Result<Vec<LoadBalancerEndpoint>, ReconcileError> {
    let port_name = match port {
        ServiceBackendPort::Number(0) => {
            return Err(ReconcileError::PortResolution {
                namespace: namespace.to_string(),
                service: name.to_string(),
                port: port.to_string(),
            });
        }
        ServiceBackendPort::Number(n) => return endpoints_at_port(store, namespace, name, *n).await,
        ServiceBackendPort::Name(port_name) => port_name,
    };

    let eps = fetch_endpoints(store, namespace, name).await?;
    let mut port_found = false;
    let mut resolved = Vec::new();
    for subset in &eps.subsets {
        let Some(ep_port) = subset.ports.iter().find(|p| &p.name == port_name) else {
            continue;
        };
        port_found = true;
        resolved.extend(subset.addresses.iter().map(|a| endpoint(&a.ip, ep_port.port)));
    }

    if !port_found {
        return Err(ReconcileError::PortResolution {
            namespace: namespace.to_string(),
            service: name.to_string(),
            port: port_name.clone(),
        });
    }
    if resolved.is_empty() {
        return Err(no_ready_endpoints(namespace, name));
    }
    Ok(resolved)
}

/// Numeric target port of a Service port. Unset means the Service port itself; a name is
/// resolved through the container ports of the pods the Service selects.
pub async fn resolve_target_port(
    store: &dyn ObjectStore,
    service: &Service,
    port: &ServicePort,
) -> Result<u16, ReconcileError> {
    let target = match &port.target_port {
        None => return Ok(port.port),
        Some(t) => t,
    };
    if let Some(n) = target.as_number() {
        return Ok(n);
    }
    let port_name = match target {
        IntOrString::String(s) => s,
        IntOrString::Int(_) => {
            return Err(ReconcileError::PortResolution {
                namespace: service.namespace.clone(),
                service: service.name.clone(),
                port: target.to_string(),
            });
        }
    };

    let pods = tokio::time::timeout(
        POD_LIST_TIMEOUT,
        store.list_pods(&service.namespace, &service.spec.selector),
    )
    .await
    .map_err(|_| ReconcileError::PodListTimeout {
        service: service.name.clone(),
    })??;

    pods.iter()
        .find_map(|p| p.named_port(port_name))
        .ok_or_else(|| ReconcileError::PortNameNotFound {
            service: service.name.clone(),
            port_name: port_name.clone(),
        })
}
