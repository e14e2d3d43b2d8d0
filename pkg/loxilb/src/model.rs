//! loxilb load balancer rule model, as exchanged with the `netlox/v1` API.

use serde::{Deserialize, Serialize};

use pkg_constants::annotations::{
    EP_SELECT_HASH, EP_SELECT_LC, EP_SELECT_N2, EP_SELECT_PERSIST, EP_SELECT_PRIORITY,
};

/// Endpoint selection algorithm. Opaque to the controller, forwarded as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum EpSelect {
    #[default]
    RoundRobin,
    Hash,
    Priority,
    Persist,
    LeastConnections,
    N2,
}

impl EpSelect {
    /// Parse the `loxilb.io/epselect` annotation. Unknown values fall back to round-robin.
    pub fn from_annotation(value: &str) -> Self {
        match value {
            EP_SELECT_HASH => EpSelect::Hash,
            EP_SELECT_PRIORITY => EpSelect::Priority,
            EP_SELECT_PERSIST => EpSelect::Persist,
            EP_SELECT_LC => EpSelect::LeastConnections,
            EP_SELECT_N2 => EpSelect::N2,
            _ => EpSelect::RoundRobin,
        }
    }
}

impl From<u8> for EpSelect {
    fn from(value: u8) -> Self {
        match value {
            1 => EpSelect::Hash,
            2 => EpSelect::Priority,
            3 => EpSelect::Persist,
            4 => EpSelect::LeastConnections,
            5 => EpSelect::N2,
            _ => EpSelect::RoundRobin,
        }
    }
}

impl From<EpSelect> for u8 {
    fn from(value: EpSelect) -> Self {
        match value {
            EpSelect::RoundRobin => 0,
            EpSelect::Hash => 1,
            EpSelect::Priority => 2,
            EpSelect::Persist => 3,
            EpSelect::LeastConnections => 4,
            EpSelect::N2 => 5,
        }
    }
}

/// NAT mode of a rule. The controller only installs `FullProxy` rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum LbMode {
    #[default]
    Default,
    OneArm,
    FullNat,
    Dsr,
    FullProxy,
    HostOneArm,
    Other(u8),
}

impl From<u8> for LbMode {
    fn from(value: u8) -> Self {
        match value {
            0 => LbMode::Default,
            1 => LbMode::OneArm,
            2 => LbMode::FullNat,
            3 => LbMode::Dsr,
            4 => LbMode::FullProxy,
            5 => LbMode::HostOneArm,
            n => LbMode::Other(n),
        }
    }
}

impl From<LbMode> for u8 {
    fn from(value: LbMode) -> Self {
        match value {
            LbMode::Default => 0,
            LbMode::OneArm => 1,
            LbMode::FullNat => 2,
            LbMode::Dsr => 3,
            LbMode::FullProxy => 4,
            LbMode::HostOneArm => 5,
            LbMode::Other(n) => n,
        }
    }
}

/// Whether loxilb terminates TLS for the rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Security {
    #[default]
    Plain,
    Https,
}

impl From<i32> for Security {
    fn from(value: i32) -> Self {
        if value == 0 { Security::Plain } else { Security::Https }
    }
}

impl From<Security> for i32 {
    fn from(value: Security) -> Self {
        match value {
            Security::Plain => 0,
            Security::Https => 1,
        }
    }
}

/// Service half of a rule: where traffic arrives and how it is balanced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerService {
    #[serde(rename = "externalIP")]
    pub external_ip: String,
    pub port: u16,
    pub protocol: String,
    #[serde(default)]
    pub sel: EpSelect,
    #[serde(default)]
    pub mode: LbMode,
    #[serde(default)]
    pub security: Security,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
}

/// One backend of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerEndpoint {
    #[serde(rename = "endpointIP")]
    pub endpoint_ip: String,
    #[serde(rename = "targetPort")]
    pub target_port: u16,
    #[serde(default)]
    pub weight: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
}

/// A complete load balancer rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerModel {
    #[serde(rename = "serviceArguments")]
    pub service: LoadBalancerService,
    #[serde(default)]
    pub endpoints: Vec<LoadBalancerEndpoint>,
}

impl LoadBalancerModel {
    /// The rule name, which identifies the Ingress it was built for.
    pub fn name(&self) -> &str {
        &self.service.name
    }
}

/// Response body of the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadBalancerList {
    #[serde(rename = "lbAttr", default)]
    pub items: Vec<LoadBalancerModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epselect_annotation_values() {
        assert_eq!(EpSelect::from_annotation("rr"), EpSelect::RoundRobin);
        assert_eq!(EpSelect::from_annotation("hash"), EpSelect::Hash);
        assert_eq!(EpSelect::from_annotation("priority"), EpSelect::Priority);
        assert_eq!(EpSelect::from_annotation("persist"), EpSelect::Persist);
        assert_eq!(EpSelect::from_annotation("lc"), EpSelect::LeastConnections);
        assert_eq!(EpSelect::from_annotation("n2"), EpSelect::N2);
        assert_eq!(EpSelect::from_annotation("random"), EpSelect::RoundRobin);
    }

    #[test]
    fn test_model_wire_format() {
        let model = LoadBalancerModel {
            service: LoadBalancerService {
                external_ip: "10.0.0.1".to_string(),
                port: 443,
                protocol: "tcp".to_string(),
                sel: EpSelect::Hash,
                mode: LbMode::FullProxy,
                security: Security::Https,
                name: "ns_app_https".to_string(),
                host: "a.com".to_string(),
            },
            endpoints: vec![LoadBalancerEndpoint {
                endpoint_ip: "10.0.0.5".to_string(),
                target_port: 8080,
                weight: 1,
                state: String::new(),
            }],
        };

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["serviceArguments"]["externalIP"], "10.0.0.1");
        assert_eq!(value["serviceArguments"]["mode"], 4);
        assert_eq!(value["serviceArguments"]["sel"], 1);
        assert_eq!(value["serviceArguments"]["security"], 1);
        assert_eq!(value["endpoints"][0]["endpointIP"], "10.0.0.5");
        assert_eq!(value["endpoints"][0]["targetPort"], 8080);
        assert!(value["endpoints"][0].get("state").is_none());
    }

    #[test]
    fn test_list_tolerates_extra_fields() {
        let body = r#"{"lbAttr":[{"serviceArguments":{"externalIP":"0.0.0.0","port":9090,
            "protocol":"tcp","sel":0,"mode":4,"name":"ns_app","inactiveTimeOut":240,"BGP":false},
            "secondaryIPs":null,
            "endpoints":[{"endpointIP":"10.0.0.7","targetPort":9090,"weight":1,"state":"active","counter":"0:0"}]}]}"#;
        let list: LoadBalancerList = serde_json::from_str(body).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].name(), "ns_app");
        assert_eq!(list.items[0].service.mode, LbMode::FullProxy);
        assert_eq!(list.items[0].endpoints[0].state, "active");
    }
}
