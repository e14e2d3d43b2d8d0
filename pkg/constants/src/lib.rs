//! Centralized constants for the loxilb ingress controller.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod annotations;
pub mod loxilb;
pub mod network;
pub mod paths;
pub mod registry;
