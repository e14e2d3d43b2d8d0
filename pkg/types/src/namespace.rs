use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A namespace as listed by the API server. Resync only needs the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
