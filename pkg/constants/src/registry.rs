//! Cluster registry key layout.

/// Watch prefix covering every Ingress.
pub const INGRESS_PREFIX: &str = "/registry/ingresses/";
