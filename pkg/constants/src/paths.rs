//! Filesystem path constants.

/// Default config file path for the controller.
pub const DEFAULT_CONFIG: &str = "/etc/loxilb-ingress/config.yaml";

/// Default location of the loxilb binary when the controller supervises it.
pub const DEFAULT_LOXILB_BINARY: &str = "/root/loxilb-io/loxilb/loxilb";

/// Default arguments passed to a supervised loxilb.
pub const DEFAULT_LOXILB_ARGS: &[&str] = &["--blacklist=eth0"];
