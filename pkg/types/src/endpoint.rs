use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An address of a backend pod serving a Service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub ip: String,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
}

/// A port exposed by a backend pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// A group of addresses sharing the same set of ports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSubset {
    /// Addresses that are ready to serve traffic.
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    #[serde(default)]
    pub not_ready_addresses: Vec<EndpointAddress>,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

/// Endpoints represents the set of backend addresses for a Service.
/// Shares the name of the Service it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
    pub created_at: DateTime<Utc>,
}
