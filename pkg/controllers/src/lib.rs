//! Ingress reconciliation against loxilb.

pub mod builder;
pub mod diff;
pub mod endpoints;
pub mod error;
pub mod ingress;
pub mod runtime;
pub mod status;

#[cfg(test)]
mod testing;

pub use error::{ReconcileError, StatusError};
pub use ingress::{Action, IngressKey, IngressReconciler};
pub use runtime::{ControllerConfig, IngressController};
