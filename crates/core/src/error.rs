use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The room allocator could not produce a room id.
    #[error("Room allocation failed: {0}")]
    Allocator(String),

    /// Script injection into a tab was refused or failed.
    #[error("Script injection failed: {0}")]
    Injection(String),

    #[error(transparent)]
    Runtime(#[from] lockstep_runtime::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
