//! Network-related constants.

/// Default loxilb REST API endpoint.
pub const DEFAULT_LOXILB_URL: &str = "http://127.0.0.1:11111";

/// Default cluster API server address (HTTP).
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:6443";

/// Delay before reconnecting a dropped watch stream.
pub const WATCH_RECONNECT_DELAY_SECS: u64 = 3;
