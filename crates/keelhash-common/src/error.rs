use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("Memory limit exceeded: requested {requested} bytes, {remaining} bytes remaining")]
    MemLimitExceeded { requested: u64, remaining: u64 },
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn mem_limit_exceeded(requested: u64, remaining: u64) -> Self {
        Error::MemLimitExceeded {
            requested,
            remaining,
        }
    }

    pub fn invalid_capacity(msg: impl Into<String>) -> Self {
        Error::InvalidCapacity(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Allocation failures are recoverable: the owning operator is expected to
    /// spill or repartition and try again.
    pub fn is_mem_limit_exceeded(&self) -> bool {
        matches!(self, Error::MemLimitExceeded { .. })
    }
}
