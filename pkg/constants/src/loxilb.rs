//! loxilb rule and reconciliation constants.

use std::time::Duration;

/// Ingress class handled by this controller.
pub const INGRESS_CLASS_NAME: &str = "loxilb";

/// Suffix of the rule name used for TLS-terminated hosts.
pub const HTTPS_RULE_SUFFIX: &str = "_https";

/// Exposed port for plaintext path-routed rules.
pub const HTTP_PORT: u16 = 80;

/// Exposed port for TLS-terminated path-routed rules.
pub const HTTPS_PORT: u16 = 443;

/// External IP used by direct-service rules (no per-rule allocation).
pub const WILDCARD_IP: &str = "0.0.0.0";

/// Protocol used when a Service port doesn't declare one.
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Every endpoint is installed with the same weight.
pub const ENDPOINT_WEIGHT: u8 = 1;

/// Error message loxilb returns when the rule is already installed.
pub const RULE_EXISTS_MESSAGE: &str = "lbrule-exists";

/// REST path for listing every load balancer rule.
pub const API_LOADBALANCER_ALL: &str = "/netlox/v1/config/loadbalancer/all";

/// REST path for creating a load balancer rule.
pub const API_LOADBALANCER: &str = "/netlox/v1/config/loadbalancer";

/// REST path prefix for deleting rules by name.
pub const API_LOADBALANCER_BY_NAME: &str = "/netlox/v1/config/loadbalancer/name";

/// Re-poll interval after a pass with nothing left to apply.
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on the pod listing used for named port resolution.
pub const POD_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// First retry delay after a failed pass; doubled per consecutive failure.
pub const ERROR_BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Retry delay ceiling.
pub const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Default interval between full resyncs of every Ingress.
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default HTTP request timeout against loxilb and the cluster API.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Delay before restarting an exited loxilb process.
pub const DATAPLANE_RESTART_DELAY: Duration = Duration::from_secs(3);
