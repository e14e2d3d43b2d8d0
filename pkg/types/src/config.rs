use serde::{Deserialize, Serialize};

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// loxilb-url: http://10.0.0.1:11111
/// api-server: http://10.0.0.1:6443
/// token: my-secret-token
/// external-ip: 10.0.0.1
/// workers: 2
/// resync-secs: 300
/// spawn-loxilb: true
/// loxilb-args: ["--blacklist=eth0"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "loxilb-url")]
    pub loxilb_url: Option<String>,
    #[serde(default, alias = "api-server")]
    pub api_server: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "external-ip")]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default, alias = "resync-secs")]
    pub resync_secs: Option<u64>,
    #[serde(default, alias = "ingress-class")]
    pub ingress_class: Option<String>,
    #[serde(default, alias = "request-timeout-secs")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, alias = "spawn-loxilb")]
    pub spawn_loxilb: Option<bool>,
    #[serde(default, alias = "loxilb-binary")]
    pub loxilb_binary: Option<String>,
    #[serde(default, alias = "loxilb-args")]
    pub loxilb_args: Option<Vec<String>>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
