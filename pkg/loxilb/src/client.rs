use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use pkg_constants::loxilb::{
    API_LOADBALANCER, API_LOADBALANCER_ALL, API_LOADBALANCER_BY_NAME, RULE_EXISTS_MESSAGE,
};

use crate::error::LoxiError;
use crate::model::{LoadBalancerList, LoadBalancerModel};

/// Remote store of load balancer rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Every rule currently installed.
    async fn list(&self) -> Result<Vec<LoadBalancerModel>, LoxiError>;

    /// Install a rule. An existing rule with the same name and port is replaced.
    async fn create(&self, model: &LoadBalancerModel) -> Result<(), LoxiError>;

    /// Remove every rule carrying `name`.
    async fn delete_by_name(&self, name: &str) -> Result<(), LoxiError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// HTTP client for the loxilb REST API.
#[derive(Clone)]
pub struct LoxiClient {
    http: reqwest::Client,
    base: String,
    host: String,
}

impl LoxiClient {
    /// Create a client for the loxilb API at `url`, e.g. `http://127.0.0.1:11111`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LoxiError> {
        let parsed = Url::parse(url).map_err(|e| LoxiError::InvalidUrl(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| LoxiError::InvalidUrl(format!("{}: missing host", url)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base: url.trim_end_matches('/').to_string(),
            host,
        })
    }

    /// Host of the loxilb API, which is also the address its rules listen on.
    pub fn host(&self) -> &str {
        &self.host
    }

    async fn error_message(resp: reqwest::Response) -> String {
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => text,
        }
    }
}

#[async_trait]
impl RuleStore for LoxiClient {
    async fn list(&self) -> Result<Vec<LoadBalancerModel>, LoxiError> {
        let url = format!("{}{}", self.base, API_LOADBALANCER_ALL);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoxiError::Api {
                status: status.as_u16(),
                message: Self::error_message(resp).await,
            });
        }
        let list: LoadBalancerList = resp.json().await?;
        debug!("Listed {} load balancer rules", list.items.len());
        Ok(list.items)
    }

    async fn create(&self, model: &LoadBalancerModel) -> Result<(), LoxiError> {
        let url = format!("{}{}", self.base, API_LOADBALANCER);
        let resp = self.http.post(&url).json(model).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = Self::error_message(resp).await;
        if status == StatusCode::CONFLICT || message.contains(RULE_EXISTS_MESSAGE) {
            return Err(LoxiError::AlreadyExists(model.name().to_string()));
        }
        Err(LoxiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), LoxiError> {
        let url = format!("{}{}/{}", self.base, API_LOADBALANCER_BY_NAME, name);
        let resp = self.http.delete(&url).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(LoxiError::NotFound(name.to_string()));
        }
        Err(LoxiError::Api {
            status: status.as_u16(),
            message: Self::error_message(resp).await,
        })
    }
}
