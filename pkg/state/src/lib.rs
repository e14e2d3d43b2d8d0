//! Access to cluster objects: the `ObjectStore` capability, its API-server backed
//! implementation, and the registry watch stream.

pub mod client;
pub mod store;
pub mod watch;

pub use client::ApiStore;
pub use store::{ObjectStore, StoreError};
pub use watch::Watcher;
