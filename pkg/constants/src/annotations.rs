//! Ingress annotation keys and values recognized by the controller.

// ─── Direct service load balancing ────────────────────────────────────────

/// Name of the Service to load-balance directly, bypassing host/path routing.
pub const DIRECT_LB_SERVICE: &str = "loxilb.io/direct-loadbalance-service";

/// Namespace of the direct Service. Defaults to the Ingress namespace.
pub const DIRECT_LB_NAMESPACE: &str = "loxilb.io/direct-loadbalance-namespace";

/// Endpoint selection policy forwarded to loxilb.
pub const EP_SELECT: &str = "loxilb.io/epselect";

// ─── Endpoint selection values ────────────────────────────────────────────

pub const EP_SELECT_RR: &str = "rr";
pub const EP_SELECT_HASH: &str = "hash";
pub const EP_SELECT_PRIORITY: &str = "priority";
pub const EP_SELECT_PERSIST: &str = "persist";
pub const EP_SELECT_LC: &str = "lc";
pub const EP_SELECT_N2: &str = "n2";

// ─── Legacy external backends ─────────────────────────────────────────────

/// Deprecated. When present, `service-<name>-namespace` overrides a backend's namespace.
pub const EXTERNAL_BACKEND_SERVICE: &str = "external-backend-service";

/// Build the per-backend namespace override key for `service_name`.
pub fn backend_namespace_key(service_name: &str) -> String {
    format!("service-{}-namespace", service_name)
}

// ─── Status source selection ──────────────────────────────────────────────

/// Gateway API controller that owns this Ingress.
pub const GATEWAY_API_CONTROLLER: &str = "gateway-api-controller";

/// Value of `gateway-api-controller` for gateways managed by loxilb.
pub const GATEWAY_CONTROLLER_LOXILB: &str = "loxilb.io/loxilb";

pub const PARENT_GATEWAY: &str = "parent-gateway";
pub const PARENT_GATEWAY_NAMESPACE: &str = "parent-gateway-namespace";

/// Suffix appended to the parent gateway name to find its ingress Service.
pub const GATEWAY_INGRESS_SERVICE_SUFFIX: &str = "-ingress-service";

/// Service whose load balancer status is copied onto the Ingress.
pub const LOADBALANCER_SERVICE: &str = "loadbalancer-service";
pub const LOADBALANCER_SERVICE_NAMESPACE: &str = "loadbalancer-service-namespace";

/// Namespace used when `loadbalancer-service-namespace` is absent.
pub const DEFAULT_STATUS_NAMESPACE: &str = "default";
