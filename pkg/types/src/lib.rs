//! Resource types shared between the cluster API, the controller, and tests.

pub mod config;
pub mod endpoint;
pub mod ingress;
pub mod namespace;
pub mod pod;
pub mod service;
pub mod watch;
