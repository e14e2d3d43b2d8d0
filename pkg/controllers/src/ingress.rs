use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use pkg_constants::loxilb::REQUEUE_INTERVAL;
use pkg_constants::registry::INGRESS_PREFIX;
use pkg_loxilb::{LoadBalancerModel, LoxiError, RuleStore};
use pkg_state::ObjectStore;
use pkg_types::ingress::Ingress;

use crate::builder::{build_models, identity_keys};
use crate::diff::{any_installed, rules_to_create, stale_names};
use crate::error::ReconcileError;
use crate::status::reflect_status;

/// Identifies one Ingress.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IngressKey {
    pub namespace: String,
    pub name: String,
}

impl IngressKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse a registry key of the form `/registry/ingresses/{ns}/{name}`.
    pub fn from_registry_key(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(INGRESS_PREFIX)?;
        let (namespace, name) = rest.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    /// Both rule names this Ingress may own.
    pub fn rule_names(&self) -> [String; 2] {
        identity_keys(&self.namespace, &self.name)
    }
}

impl fmt::Display for IngressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What the runtime should do after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reconcile again after the delay.
    Requeue(Duration),
    /// Nothing to do until the Ingress changes again.
    AwaitChange,
}

/// States of one reconciliation pass.
enum Phase {
    FetchRemote,
    CheckSource {
        snapshot: Vec<LoadBalancerModel>,
    },
    Deleted,
    BuildModels {
        snapshot: Vec<LoadBalancerModel>,
        ingress: Ingress,
    },
    RollbackOnError {
        snapshot: Vec<LoadBalancerModel>,
        error: ReconcileError,
    },
    Diff {
        snapshot: Vec<LoadBalancerModel>,
        ingress: Ingress,
        desired: Vec<LoadBalancerModel>,
    },
    Apply {
        ingress: Ingress,
        create: Vec<LoadBalancerModel>,
        stale: Vec<String>,
    },
    UpdateStatus {
        ingress: Ingress,
    },
    Done(Action),
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::FetchRemote => "FetchRemote",
            Phase::CheckSource { .. } => "CheckSource",
            Phase::Deleted => "Deleted",
            Phase::BuildModels { .. } => "BuildModels",
            Phase::RollbackOnError { .. } => "RollbackOnError",
            Phase::Diff { .. } => "Diff",
            Phase::Apply { .. } => "Apply",
            Phase::UpdateStatus { .. } => "UpdateStatus",
            Phase::Done(_) => "Done",
        }
    }
}

/// Reconciles one Ingress at a time into loxilb rules.
pub struct IngressReconciler {
    objects: Arc<dyn ObjectStore>,
    rules: Arc<dyn RuleStore>,
    external_ip: String,
}

impl IngressReconciler {
    /// `external_ip` is where path-routed rules listen, normally the loxilb host.
    pub fn new(objects: Arc<dyn ObjectStore>, rules: Arc<dyn RuleStore>, external_ip: &str) -> Self {
        Self {
            objects,
            rules,
            external_ip: external_ip.to_string(),
        }
    }

    /// Run one pass for `key` to completion.
    pub async fn reconcile(&self, key: &IngressKey) -> Result<Action, ReconcileError> {
        let mut phase = Phase::FetchRemote;
        loop {
            debug!("Ingress {}: {}", key, phase.label());
            phase = match phase {
                Phase::Done(action) => return Ok(action),
                Phase::FetchRemote => {
                    let snapshot = self.rules.list().await.map_err(ReconcileError::ListRules)?;
                    Phase::CheckSource { snapshot }
                }
                Phase::CheckSource { snapshot } => {
                    match self.objects.get_ingress(&key.namespace, &key.name).await? {
                        Some(ingress) => Phase::BuildModels { snapshot, ingress },
                        None => Phase::Deleted,
                    }
                }
                Phase::Deleted => {
                    self.delete_rules(key).await;
                    Phase::Done(Action::AwaitChange)
                }
                Phase::BuildModels { snapshot, ingress } => {
                    match build_models(self.objects.as_ref(), &ingress, &self.external_ip).await {
                        Ok(desired) => Phase::Diff {
                            snapshot,
                            ingress,
                            desired,
                        },
                        Err(error) => Phase::RollbackOnError { snapshot, error },
                    }
                }
                Phase::RollbackOnError { snapshot, error } => {
                    if any_installed(&key.rule_names(), &snapshot) {
                        warn!("Ingress {}: rolling back installed rules after error: {}", key, error);
                        self.delete_rules(key).await;
                    }
                    return Err(error);
                }
                Phase::Diff {
                    snapshot,
                    ingress,
                    desired,
                } => {
                    let stale = stale_names(&key.rule_names(), &desired, &snapshot);
                    let create: Vec<LoadBalancerModel> =
                        rules_to_create(&desired, &snapshot).into_iter().cloned().collect();
                    Phase::Apply {
                        ingress,
                        create,
                        stale,
                    }
                }
                Phase::Apply {
                    ingress,
                    create,
                    stale,
                } => {
                    for name in &stale {
                        self.delete_rule(key, name).await;
                    }
                    if create.is_empty() {
                        debug!("Ingress {}: rules converged", key);
                        Phase::Done(Action::Requeue(REQUEUE_INTERVAL))
                    } else {
                        self.create_rules(key, &create).await?;
                        Phase::UpdateStatus { ingress }
                    }
                }
                Phase::UpdateStatus { mut ingress } => {
                    if let Err(e) = reflect_status(self.objects.as_ref(), &mut ingress).await {
                        warn!("Ingress {}: failed to update status: {}", key, e);
                    }
                    Phase::Done(Action::Requeue(REQUEUE_INTERVAL))
                }
            };
        }
    }

    async fn create_rules(&self, key: &IngressKey, models: &[LoadBalancerModel]) -> Result<(), ReconcileError> {
        for model in models {
            match self.rules.create(model).await {
                Ok(()) => info!(
                    "Ingress {}: created rule {} on port {} with {} endpoints",
                    key,
                    model.name(),
                    model.service.port,
                    model.endpoints.len()
                ),
                Err(LoxiError::AlreadyExists(name)) => {
                    debug!("Ingress {}: rule {} already exists", key, name)
                }
                Err(source) => {
                    return Err(ReconcileError::CreateRule {
                        name: model.name().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Delete both rule names. Failures are logged and never abort the caller.
    async fn delete_rules(&self, key: &IngressKey) {
        for name in key.rule_names() {
            self.delete_rule(key, &name).await;
        }
    }

    async fn delete_rule(&self, key: &IngressKey, name: &str) {
        match self.rules.delete_by_name(name).await {
            Ok(()) => info!("Ingress {}: deleted rule {}", key, name),
            Err(LoxiError::NotFound(_)) => debug!("Ingress {}: rule {} not installed", key, name),
            Err(e) => warn!("Ingress {}: failed to delete rule {}: {}", key, name, e),
        }
    }
}
