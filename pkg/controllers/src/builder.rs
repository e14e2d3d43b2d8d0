//! Translates an Ingress into the load balancer rules that should exist for it.

use tracing::debug;

use pkg_constants::annotations::{
    DIRECT_LB_NAMESPACE, DIRECT_LB_SERVICE, EP_SELECT, EXTERNAL_BACKEND_SERVICE,
    backend_namespace_key,
};
use pkg_constants::loxilb::{
    DEFAULT_PROTOCOL, HTTP_PORT, HTTPS_PORT, HTTPS_RULE_SUFFIX, WILDCARD_IP,
};
use pkg_loxilb::{EpSelect, LbMode, LoadBalancerModel, LoadBalancerService, Security};
use pkg_state::ObjectStore;
use pkg_types::ingress::Ingress;

use crate::endpoints::{endpoints_at_port, resolve_backend, resolve_target_port};
use crate::error::ReconcileError;

/// Rule name for plaintext rules of `namespace/name`.
pub fn rule_name(namespace: &str, name: &str) -> String {
    format!("{}_{}", namespace, name)
}

/// Both rule names an Ingress may own: plaintext first, then TLS.
pub fn identity_keys(namespace: &str, name: &str) -> [String; 2] {
    let plain = rule_name(namespace, name);
    let https = format!("{}{}", plain, HTTPS_RULE_SUFFIX);
    [plain, https]
}

/// Namespace of a backend Service. The deprecated `external-backend-service` annotation
/// enables per-service namespace overrides.
fn backend_namespace<'a>(ingress: &'a Ingress, service: &str) -> &'a str {
    if ingress.annotation(EXTERNAL_BACKEND_SERVICE).is_none() {
        return &ingress.namespace;
    }
    ingress
        .annotation(&backend_namespace_key(service))
        .unwrap_or(&ingress.namespace)
}

/// Add `model`, replacing an earlier one with the same name, port and protocol in place.
fn upsert(models: &mut Vec<LoadBalancerModel>, model: LoadBalancerModel) {
    let existing = models.iter_mut().find(|m| {
        m.service.name == model.service.name
            && m.service.port == model.service.port
            && m.service.protocol == model.service.protocol
    });
    match existing {
        Some(slot) => *slot = model,
        None => models.push(model),
    }
}

/// Desired rules for `ingress`, in direct-service mode when it names a direct Service,
/// otherwise from its host/path rules.
pub async fn build_models(
    store: &dyn ObjectStore,
    ingress: &Ingress,
    external_ip: &str,
) -> Result<Vec<LoadBalancerModel>, ReconcileError> {
    match ingress.annotation(DIRECT_LB_SERVICE) {
        Some(service) => build_direct_service(store, ingress, service).await,
        None => build_path_routed(store, ingress, external_ip).await,
    }
}

/// One fullproxy rule per backend path: port 80 for plaintext hosts, 443 for TLS hosts.
/// Paths in the same security class collapse onto one rule name.
pub async fn build_path_routed(
    store: &dyn ObjectStore,
    ingress: &Ingress,
    external_ip: &str,
) -> Result<Vec<LoadBalancerModel>, ReconcileError> {
    let [plain, https] = identity_keys(&ingress.namespace, &ingress.name);
    let mut models = Vec::new();

    for rule in &ingress.spec.rules {
        let Some(http) = &rule.http else {
            continue;
        };
        let secure = ingress.is_tls_host(&rule.host);

        for path in &http.paths {
            let Some(backend) = &path.backend.service else {
                continue;
            };
            let namespace = backend_namespace(ingress, &backend.name);
            let endpoints = resolve_backend(store, namespace, &backend.name, &backend.port).await?;

            let (name, port, security) = if secure {
                (https.clone(), HTTPS_PORT, Security::Https)
            } else {
                (plain.clone(), HTTP_PORT, Security::Plain)
            };
            upsert(
                &mut models,
                LoadBalancerModel {
                    service: LoadBalancerService {
                        external_ip: external_ip.to_string(),
                        port,
                        protocol: DEFAULT_PROTOCOL.to_string(),
                        sel: EpSelect::RoundRobin,
                        mode: LbMode::FullProxy,
                        security,
                        name,
                        host: rule.host.clone(),
                    },
                    endpoints,
                },
            );
        }
    }

    debug!(
        "Ingress {}/{}: built {} path-routed rules",
        ingress.namespace,
        ingress.name,
        models.len()
    );
    Ok(models)
}

/// One rule per port of the annotated Service, listening on every address.
pub async fn build_direct_service(
    store: &dyn ObjectStore,
    ingress: &Ingress,
    service_name: &str,
) -> Result<Vec<LoadBalancerModel>, ReconcileError> {
    let namespace = ingress
        .annotation(DIRECT_LB_NAMESPACE)
        .unwrap_or(&ingress.namespace);
    let sel = ingress
        .annotation(EP_SELECT)
        .map(EpSelect::from_annotation)
        .unwrap_or_default();

    let service = store
        .get_service(namespace, service_name)
        .await?
        .ok_or_else(|| ReconcileError::ServiceNotFound {
            namespace: namespace.to_string(),
            name: service_name.to_string(),
        })?;

    let name = rule_name(&ingress.namespace, &ingress.name);
    let mut models = Vec::new();
    for port in &service.spec.ports {
        let target_port = resolve_target_port(store, &service, port).await?;
        let endpoints = endpoints_at_port(store, namespace, service_name, target_port).await?;
        let protocol = port
            .protocol
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());

        upsert(
            &mut models,
            LoadBalancerModel {
                service: LoadBalancerService {
                    external_ip: WILDCARD_IP.to_string(),
                    port: port.port,
                    protocol,
                    sel,
                    mode: LbMode::FullProxy,
                    security: Security::Plain,
                    name: name.clone(),
                    host: String::new(),
                },
                endpoints,
            },
        );
    }

    debug!(
        "Ingress {}/{}: built {} direct rules for service {}/{}",
        ingress.namespace,
        ingress.name,
        models.len(),
        namespace,
        service_name
    );
    Ok(models)
}
