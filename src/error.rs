use thiserror::Error;

/// Whole-call input problems, detected before any probe is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("timeout must be a positive duration")]
    NonPositiveTimeout,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("concurrency {0} exceeds the maximum of {max}", max = tokio::sync::Semaphore::MAX_PERMITS)]
    ConcurrencyTooLarge(usize),
    #[error("host name at position {0} is empty")]
    EmptyHost(usize),
    #[error("port at position {0} is 0")]
    ZeroPort(usize),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}
