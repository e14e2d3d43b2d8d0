use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use pkg_types::endpoint::Endpoints;
use pkg_types::ingress::Ingress;
use pkg_types::namespace::Namespace;
use pkg_types::pod::Pod;
use pkg_types::service::Service;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid api server url {0}")]
    InvalidUrl(String),
    #[error("api server request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api server returned {status} for {path}: {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
    },
}

/// Cluster objects the controller reads, plus the Ingress status it writes.
///
/// Lookups return `Ok(None)` when the object doesn't exist.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError>;

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, StoreError>;

    /// Pods in `namespace` carrying every label in `selector`.
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &HashMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError>;

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, StoreError>;

    /// Replace the status of `ingress` with `ingress.status`.
    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<(), StoreError>;
}
