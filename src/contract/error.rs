use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("failed to access contract file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid contract file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize contract: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("mock provider failed to start: {0}")]
    MockServer(#[source] std::io::Error),
    #[error("mock provider verification failed:\n{}", .0.join("\n"))]
    Unverified(Vec<String>),
    #[error("contract is for provider '{found}', expected '{expected}'")]
    ProviderMismatch { expected: String, found: String },
    #[error("no contracts to verify")]
    NoSources,
    #[error("invalid request in interaction '{description}': {reason}")]
    InvalidInteraction { description: String, reason: String },
}
