#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("connection reported no endpoints")]
    NoEndpoints,

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("failed to deserialize value: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}
