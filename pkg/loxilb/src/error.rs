use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoxiError {
    #[error("invalid loxilb url {0}")]
    InvalidUrl(String),
    #[error("loxilb request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("load balancer rule {0} already exists")]
    AlreadyExists(String),
    #[error("load balancer rule {0} not found")]
    NotFound(String),
    #[error("loxilb returned {status}: {message}")]
    Api { status: u16, message: String },
}
