//! Copies the load balancer addresses of a Service onto an Ingress status.

use tracing::{debug, info};

use pkg_constants::annotations::{
    DEFAULT_STATUS_NAMESPACE, GATEWAY_API_CONTROLLER, GATEWAY_CONTROLLER_LOXILB,
    GATEWAY_INGRESS_SERVICE_SUFFIX, LOADBALANCER_SERVICE, LOADBALANCER_SERVICE_NAMESPACE,
    PARENT_GATEWAY, PARENT_GATEWAY_NAMESPACE,
};
use pkg_state::ObjectStore;
use pkg_types::ingress::{Ingress, IngressLoadBalancerIngress, IngressPortStatus};
use pkg_types::service::{LoadBalancerIngress, Service};

use crate::error::StatusError;

/// The Service whose status is reflected, as `(namespace, name)`, or `None` when the
/// Ingress doesn't ask for one.
pub fn status_source(ingress: &Ingress) -> Option<(String, String)> {
    if let Some(controller) = ingress.annotation(GATEWAY_API_CONTROLLER) {
        if controller != GATEWAY_CONTROLLER_LOXILB {
            return None;
        }
        let gateway = ingress.annotation(PARENT_GATEWAY)?;
        let namespace = ingress
            .annotation(PARENT_GATEWAY_NAMESPACE)
            .unwrap_or(&ingress.namespace);
        return Some((
            namespace.to_string(),
            format!("{}{}", gateway, GATEWAY_INGRESS_SERVICE_SUFFIX),
        ));
    }

    let name = ingress.annotation(LOADBALANCER_SERVICE)?;
    let namespace = ingress
        .annotation(LOADBALANCER_SERVICE_NAMESPACE)
        .unwrap_or(DEFAULT_STATUS_NAMESPACE);
    Some((namespace.to_string(), name.to_string()))
}

fn already_recorded(recorded: &[IngressLoadBalancerIngress], entry: &LoadBalancerIngress) -> bool {
    recorded.iter().any(|r| {
        (!r.ip.is_empty() && r.ip == entry.ip)
            || (!r.hostname.is_empty() && r.hostname == entry.hostname)
    })
}

/// Append every load balancer address of `service` not yet on `ingress`.
/// Returns whether anything was added.
pub fn merge_status(ingress: &mut Ingress, service: &Service) -> bool {
    let recorded = &mut ingress.status.load_balancer.ingress;
    let mut added = false;
    for entry in &service.status.load_balancer.ingress {
        if already_recorded(recorded, entry) {
            continue;
        }
        recorded.push(IngressLoadBalancerIngress {
            ip: entry.ip.clone(),
            hostname: entry.hostname.clone(),
            ports: entry
                .ports
                .iter()
                .map(|p| IngressPortStatus {
                    port: p.port,
                    protocol: p.protocol.clone(),
                    error: p.error.clone(),
                })
                .collect(),
        });
        added = true;
    }
    added
}

/// Reflect the status Service's addresses onto `ingress` and write the status back.
/// Returns whether a write happened.
pub async fn reflect_status(store: &dyn ObjectStore, ingress: &mut Ingress) -> Result<bool, StatusError> {
    let Some((namespace, name)) = status_source(ingress) else {
        debug!("Ingress {}/{}: no status source", ingress.namespace, ingress.name);
        return Ok(false);
    };

    let service = store
        .get_service(&namespace, &name)
        .await?
        .ok_or(StatusError::SourceNotFound { namespace, name })?;

    if !merge_status(ingress, &service) {
        return Ok(false);
    }
    store.update_ingress_status(ingress).await?;
    info!(
        "Ingress {}/{}: status updated from service {}/{}",
        ingress.namespace, ingress.name, service.namespace, service.name
    );
    Ok(true)
}
