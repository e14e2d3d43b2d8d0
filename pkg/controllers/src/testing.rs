//! In-memory object and rule stores for controller tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pkg_loxilb::{LoadBalancerModel, LoxiError, RuleStore};
use pkg_state::{ObjectStore, StoreError};
use pkg_types::endpoint::{EndpointAddress, EndpointPort, EndpointSubset, Endpoints};
use pkg_types::ingress::{
    Ingress, IngressBackend, IngressHTTP, IngressPath, IngressRule, IngressServiceBackend,
    IngressSpec, IngressTLS, PathType, ServiceBackendPort,
};
use pkg_types::namespace::Namespace;
use pkg_types::pod::{ContainerPort, ContainerSpec, Pod, PodSpec, PodStatus};
use pkg_types::service::{IntOrString, Service, ServicePort, ServiceSpec, ServiceStatus, ServiceType};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
pub struct FakeObjectStore {
    ingresses: Mutex<HashMap<Key, Ingress>>,
    services: Mutex<HashMap<Key, Service>>,
    endpoints: Mutex<HashMap<Key, Endpoints>>,
    pods: Mutex<Vec<Pod>>,
    status_updates: Mutex<Vec<Ingress>>,
    pub fail_status: AtomicBool,
    pub fail_get_ingress: AtomicBool,
    /// `list_pods` never completes.
    pub stall_pods: AtomicBool,
}

impl FakeObjectStore {
    pub fn add_ingress(&self, ingress: Ingress) {
        let k = key(&ingress.namespace, &ingress.name);
        self.ingresses.lock().unwrap().insert(k, ingress);
    }

    pub fn remove_ingress(&self, namespace: &str, name: &str) {
        self.ingresses.lock().unwrap().remove(&key(namespace, name));
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.ingresses.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn add_service(&self, service: Service) {
        let k = key(&service.namespace, &service.name);
        self.services.lock().unwrap().insert(k, service);
    }

    pub fn add_endpoints(&self, endpoints: Endpoints) {
        let k = key(&endpoints.namespace, &endpoints.name);
        self.endpoints.lock().unwrap().insert(k, endpoints);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.pods.lock().unwrap().push(pod);
    }

    pub fn status_updates(&self) -> Vec<Ingress> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, StoreError> {
        if self.fail_get_ingress.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                path: format!("/api/v1/namespaces/{}/ingresses/{}", namespace, name),
                message: "api server unavailable".to_string(),
            });
        }
        Ok(self.ingress(namespace, name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        Ok(self.services.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Endpoints>, StoreError> {
        Ok(self.endpoints.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &HashMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError> {
        if self.stall_pods.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.namespace == namespace && p.matches_selector(selector))
            .cloned()
            .collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let names: HashSet<String> = self
            .ingresses
            .lock()
            .unwrap()
            .keys()
            .map(|(ns, _)| ns.clone())
            .collect();
        Ok(names
            .into_iter()
            .map(|name| Namespace {
                name,
                created_at: None,
            })
            .collect())
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<Ingress>, StoreError> {
        Ok(self
            .ingresses
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<(), StoreError> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 500,
                path: format!("/api/v1/namespaces/{}/ingresses/{}/status", ingress.namespace, ingress.name),
                message: "status write refused".to_string(),
            });
        }
        self.status_updates.lock().unwrap().push(ingress.clone());
        if let Some(stored) = self.ingresses.lock().unwrap().get_mut(&key(&ingress.namespace, &ingress.name)) {
            stored.status = ingress.status.clone();
        }
        Ok(())
    }
}

/// Rule store that behaves like loxilb: create replaces a rule with the same
/// (name, port, protocol), delete removes every rule with the name.
#[derive(Default)]
pub struct FakeRuleStore {
    rules: Mutex<Vec<LoadBalancerModel>>,
    created: Mutex<Vec<LoadBalancerModel>>,
    deleted: Mutex<Vec<String>>,
    failing_creates: Mutex<HashSet<String>>,
    existing_on_create: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    pub fail_list: AtomicBool,
}

impl FakeRuleStore {
    pub fn install(&self, model: LoadBalancerModel) {
        self.rules.lock().unwrap().push(model);
    }

    pub fn rules(&self) -> Vec<LoadBalancerModel> {
        self.rules.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<LoadBalancerModel> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn clear_log(&self) {
        self.created.lock().unwrap().clear();
        self.deleted.lock().unwrap().clear();
    }

    pub fn fail_create(&self, name: &str) {
        self.failing_creates.lock().unwrap().insert(name.to_string());
    }

    pub fn report_exists(&self, name: &str) {
        self.existing_on_create.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl RuleStore for FakeRuleStore {
    async fn list(&self) -> Result<Vec<LoadBalancerModel>, LoxiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(LoxiError::Api {
                status: 503,
                message: "loxilb unavailable".to_string(),
            });
        }
        Ok(self.rules())
    }

    async fn create(&self, model: &LoadBalancerModel) -> Result<(), LoxiError> {
        let name = model.name().to_string();
        if self.failing_creates.lock().unwrap().contains(&name) {
            return Err(LoxiError::Api {
                status: 500,
                message: "lbrule-add error".to_string(),
            });
        }
        self.created.lock().unwrap().push(model.clone());
        if self.existing_on_create.lock().unwrap().contains(&name) {
            return Err(LoxiError::AlreadyExists(name));
        }
        let mut rules = self.rules.lock().unwrap();
        rules.retain(|r| {
            !(r.name() == model.name()
                && r.service.port == model.service.port
                && r.service.protocol == model.service.protocol)
        });
        rules.push(model.clone());
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), LoxiError> {
        self.deleted.lock().unwrap().push(name.to_string());
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| r.name() != name);
        if rules.len() == before {
            return Err(LoxiError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

/// Ingress of class `loxilb` with one `/` path per `(host, service, port)`.
pub fn make_ingress(namespace: &str, name: &str, rules: &[(&str, &str, u16)]) -> Ingress {
    Ingress {
        name: name.to_string(),
        namespace: namespace.to_string(),
        annotations: HashMap::new(),
        spec: IngressSpec {
            ingress_class_name: Some("loxilb".to_string()),
            rules: rules
                .iter()
                .map(|(host, svc, port)| IngressRule {
                    host: host.to_string(),
                    http: Some(IngressHTTP {
                        paths: vec![IngressPath {
                            path: "/".to_string(),
                            path_type: PathType::Prefix,
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: svc.to_string(),
                                    port: ServiceBackendPort::Number(*port),
                                }),
                            },
                        }],
                    }),
                })
                .collect(),
            tls: None,
        },
        status: Default::default(),
        created_at: chrono::Utc::now(),
    }
}

pub fn with_tls(mut ingress: Ingress, hosts: &[&str]) -> Ingress {
    ingress.spec.tls = Some(vec![IngressTLS {
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        secret_name: "tls-secret".to_string(),
    }]);
    ingress
}

pub fn make_endpoints(namespace: &str, name: &str, ips: &[&str], ports: &[(&str, u16)]) -> Endpoints {
    Endpoints {
        name: name.to_string(),
        namespace: namespace.to_string(),
        subsets: vec![EndpointSubset {
            addresses: ips
                .iter()
                .map(|ip| EndpointAddress {
                    ip: ip.to_string(),
                    node_name: None,
                    pod_name: None,
                })
                .collect(),
            not_ready_addresses: vec![],
            ports: ports
                .iter()
                .map(|(n, p)| EndpointPort {
                    name: n.to_string(),
                    port: *p,
                    protocol: "TCP".to_string(),
                })
                .collect(),
        }],
        created_at: chrono::Utc::now(),
    }
}

pub fn make_pod(namespace: &str, name: &str, labels: &[(&str, &str)], ports: &[(&str, u16)]) -> Pod {
    Pod {
        name: name.to_string(),
        namespace: namespace.to_string(),
        spec: PodSpec {
            containers: vec![ContainerSpec {
                name: "app".to_string(),
                image: "nginx:latest".to_string(),
                ports: ports
                    .iter()
                    .map(|(n, p)| ContainerPort {
                        name: n.to_string(),
                        container_port: *p,
                        protocol: None,
                    })
                    .collect(),
            }],
        },
        status: PodStatus::Running,
        labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        created_at: chrono::Utc::now(),
    }
}

/// Service with one port per `(port, target)`. Targets are given as strings.
pub fn make_service(
    namespace: &str,
    name: &str,
    selector: &[(&str, &str)],
    ports: &[(u16, Option<&str>)],
) -> Service {
    Service {
        name: name.to_string(),
        namespace: namespace.to_string(),
        spec: ServiceSpec {
            selector: selector.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ports: ports
                .iter()
                .map(|(port, target)| ServicePort {
                    name: format!("p{}", port),
                    protocol: Some("TCP".to_string()),
                    port: *port,
                    target_port: target.map(|t| IntOrString::String(t.to_string())),
                    node_port: None,
                })
                .collect(),
            service_type: ServiceType::ClusterIP,
        },
        status: ServiceStatus::default(),
        cluster_ip: None,
        created_at: chrono::Utc::now(),
    }
}
