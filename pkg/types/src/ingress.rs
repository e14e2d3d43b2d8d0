use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Path matching type for Ingress rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PathType {
    #[default]
    Prefix,
    Exact,
    ImplementationSpecific,
}

/// Port of the Service a path routes to, by number or by name.
///
/// Serialized the Kubernetes way: `{"number": 80}` or `{"name": "http"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceBackendPort {
    Number(u16),
    Name(String),
}

impl std::fmt::Display for ServiceBackendPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceBackendPort::Number(n) => write!(f, "{}", n),
            ServiceBackendPort::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Service referenced by an Ingress path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressServiceBackend {
    pub name: String,
    pub port: ServiceBackendPort,
}

/// Backend target for an Ingress path. Only Service backends are routable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressBackend {
    #[serde(default)]
    pub service: Option<IngressServiceBackend>,
}

/// A single path rule within an Ingress HTTP rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressPath {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub path_type: PathType,
    pub backend: IngressBackend,
}

/// HTTP rules for a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressHTTP {
    pub paths: Vec<IngressPath>,
}

/// A single host-based Ingress rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub http: Option<IngressHTTP>,
}

/// TLS configuration for an Ingress. The secret is never read by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressTLS {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub secret_name: String,
}

/// Ingress specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressSpec {
    #[serde(default)]
    pub ingress_class_name: Option<String>,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
    #[serde(default)]
    pub tls: Option<Vec<IngressTLS>>,
}

/// Port reported for an assigned load balancer address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPortStatus {
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// An external address assigned to the Ingress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressLoadBalancerIngress {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ports: Vec<IngressPortStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressLoadBalancerStatus {
    #[serde(default)]
    pub ingress: Vec<IngressLoadBalancerIngress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressStatus {
    #[serde(default)]
    pub load_balancer: IngressLoadBalancerStatus,
}

/// Ingress resource for external traffic routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingress {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub spec: IngressSpec,
    #[serde(default)]
    pub status: IngressStatus,
    pub created_at: DateTime<Utc>,
}

impl Ingress {
    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Whether `host` is covered by any TLS block.
    pub fn is_tls_host(&self, host: &str) -> bool {
        self.spec
            .tls
            .iter()
            .flatten()
            .any(|tls| tls.hosts.iter().any(|h| h == host))
    }

    /// Whether this Ingress is claimed by the given ingress class.
    pub fn has_class(&self, class: &str) -> bool {
        self.spec.ingress_class_name.as_deref() == Some(class)
    }
}
