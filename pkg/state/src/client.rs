use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use pkg_types::endpoint::Endpoints;
use pkg_types::ingress::Ingress;
use pkg_types::namespace::Namespace;
use pkg_types::pod::Pod;
use pkg_types::service::Service;

use crate::store::{ObjectStore, StoreError};

/// Object store backed by the cluster API server's REST API.
#[derive(Clone)]
pub struct ApiStore {
    http: reqwest::Client,
    base: String,
    token: String,
}

/// Render a label selector as `k1=v1,k2=v2`, sorted for stable URLs.
pub fn format_selector(selector: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = selector.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    pairs.join(",")
}

impl ApiStore {
    pub fn new(server: &str, token: &str, timeout: Duration) -> Result<Self, StoreError> {
        Url::parse(server).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", server, e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: server.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn namespaced(namespace: &str, resource: &str) -> String {
        format!("/api/v1/namespaces/{}/{}", namespace, resource)
    }

    async fn api_error(path: &str, resp: reqwest::Response) -> StoreError {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        StoreError::Api {
            status,
            path: path.to_string(),
            message,
        }
    }

    async fn get_url<T: DeserializeOwned>(
        &self,
        path: &str,
        url: Url,
    ) -> Result<Option<T>, StoreError> {
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::api_error(path, resp).await);
        }
        Ok(Some(resp.json().await?))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let url = self.url(path, &[])?;
        self.get_url(path, url).await
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, StoreError> {
        let raw = format!("{}{}", self.base, path);
        Url::parse_with_params(&raw, params).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

#[async_trait]
impl ObjectStore for ApiStore {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError> {
        let path = Self::namespaced(namespace, &format!("ingresses/{}", name));
        self.get_json(&path).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        let path = Self::namespaced(namespace, &format!("services/{}", name));
        self.get_json(&path).await
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, StoreError> {
        let path = Self::namespaced(namespace, &format!("endpoints/{}", name));
        self.get_json(&path).await
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &HashMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError> {
        let path = Self::namespaced(namespace, "pods");
        let label_selector = format_selector(selector);
        let url = self.url(&path, &[("labelSelector", label_selector.as_str())])?;
        let pods: Vec<Pod> = self.get_url(&path, url).await?.unwrap_or_default();
        // The server may ignore the selector, so filter here as well.
        let matched: Vec<Pod> = pods
            .into_iter()
            .filter(|p| p.matches_selector(selector))
            .collect();
        debug!(
            "Listed {} pods in {} matching {}",
            matched.len(),
            namespace,
            label_selector
        );
        Ok(matched)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        Ok(self
            .get_json("/api/v1/namespaces")
            .await?
            .unwrap_or_default())
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, StoreError> {
        let path = Self::namespaced(namespace, "ingresses");
        Ok(self.get_json(&path).await?.unwrap_or_default())
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<(), StoreError> {
        let path = Self::namespaced(
            &ingress.namespace,
            &format!("ingresses/{}/status", ingress.name),
        );
        let url = self.url(&path, &[])?;
        let resp = self
            .http
            .put(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&ingress.status)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(&path, resp).await);
        }
        Ok(())
    }
}
