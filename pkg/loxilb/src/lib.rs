//! Client for the loxilb REST API and its load balancer rule model.

pub mod client;
pub mod error;
pub mod model;

pub use client::{LoxiClient, RuleStore};
pub use error::LoxiError;
pub use model::{EpSelect, LbMode, LoadBalancerEndpoint, LoadBalancerModel, LoadBalancerService, Security};
