use thiserror::Error;

use pkg_loxilb::LoxiError;
use pkg_state::StoreError;

/// Why a reconciliation pass was aborted. Every variant is retried by the runtime.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list load balancer rules: {0}")]
    ListRules(#[source] LoxiError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("no ready endpoints for service {namespace}/{name}")]
    NoReadyEndpoints { namespace: String, name: String },

    #[error("port {port} of service {namespace}/{service} has no matching endpoint port")]
    PortResolution {
        namespace: String,
        service: String,
        port: String,
    },

    #[error("no pod selected by service {service} declares a container port named {port_name}")]
    PortNameNotFound { service: String, port_name: String },

    #[error("listing pods for service {service} timed out")]
    PodListTimeout { service: String },

    #[error("service {namespace}/{name} not found")]
    ServiceNotFound { namespace: String, name: String },

    #[error("failed to create load balancer rule {name}: {source}")]
    CreateRule {
        name: String,
        #[source]
        source: LoxiError,
    },
}

/// Failure while copying load balancer addresses onto an Ingress. Never aborts a pass.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status service {namespace}/{name} not found")]
    SourceNotFound { namespace: String, name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
